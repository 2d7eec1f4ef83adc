//! Host identity: the Ed25519 keypair clients mint auth tokens for.
//!
//! The secret comes from `KEYHOST_SECRET` when set. Otherwise it is read back
//! from storage under `"host_identity_secret"`, or generated and saved there
//! on first startup. Hosts on in-memory storage therefore get a fresh
//! identity every run unless `KEYHOST_SECRET` pins one.

use std::sync::Arc;

use keyhost_core::{Keypair, PublicIdentity};

use crate::storage::{Storage, StorageError};

const SECRET_KEY: &str = "host_identity_secret";

/// The host's stable Ed25519 identity.
pub struct HostIdentity {
    keypair: Keypair,
}

impl HostIdentity {
    /// Use `configured` if given, else load the secret from storage, else
    /// generate a new one and save it.
    pub async fn load_or_generate(
        storage: &Arc<dyn Storage>,
        configured: Option<&str>,
    ) -> Result<Self, StorageError> {
        if let Some(secret_hex) = configured {
            let keypair = Keypair::from_secret_hex(secret_hex)
                .map_err(|e| StorageError::Internal(format!("KEYHOST_SECRET: {e}")))?;
            return Ok(Self { keypair });
        }

        if let Some(secret_hex) = storage.get_host_config(SECRET_KEY).await? {
            let keypair = Keypair::from_secret_hex(&secret_hex)
                .map_err(|e| StorageError::Internal(format!("invalid stored identity: {e}")))?;
            return Ok(Self { keypair });
        }

        let keypair = Keypair::generate();
        storage
            .set_host_config(SECRET_KEY, &hex::encode(keypair.secret()))
            .await?;
        Ok(Self { keypair })
    }

    pub fn from_keypair(keypair: Keypair) -> Self {
        Self { keypair }
    }

    pub fn public_identity(&self) -> PublicIdentity {
        self.keypair.public_identity()
    }

    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }
}
