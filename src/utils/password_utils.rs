//! Hachage et vérification des mots de passe

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHashString, PasswordVerifier, SaltString},
    Argon2, PasswordHasher,
};
use derive_more::Display;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub use argon2::password_hash::Error as HashError;

static DEFAULT_HASHER: Lazy<Argon2<'static>> = Lazy::new(Argon2::default);

/// Haché d'un mot de passe vide, vérifié à la place d'un compte inexistant
/// pour que la réponse prenne le même temps
static EMPTY_HASH: Lazy<Option<PWHash>> = Lazy::new(|| hash("").ok());

/// Un mot de passe haché (chaîne PHC Argon2id)
#[derive(Clone, Debug, Display)]
pub struct PWHash(PasswordHashString);

impl PartialEq for PWHash {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_str() == other.0.as_str()
    }
}

impl Eq for PWHash {}

impl Serialize for PWHash {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.as_str().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PWHash {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let hash = PasswordHashString::from_str(&s)
            .map_err(|_| <D::Error as serde::de::Error>::custom("Invalid PHC string"))?;
        Ok(PWHash(hash))
    }
}

/// Calcule un haché à partir d'un mot de passe en clair, avec un sel aléatoire
pub fn hash(password: &str) -> Result<PWHash, HashError> {
    let salt = SaltString::generate(&mut OsRng);

    let hash = DEFAULT_HASHER
        .hash_password(password.as_bytes(), &salt)?
        .serialize();

    Ok(PWHash(hash))
}

/// Vérifie si le mot de passe correspond au haché stocké.
///
/// Sans haché (compte inconnu), le mot de passe est tout de même vérifié
/// contre un faux haché et le résultat est toujours `false`.
pub fn verify(password: &str, maybe_hash: Option<&PWHash>) -> bool {
    match maybe_hash {
        Some(hash) => DEFAULT_HASHER
            .verify_password(password.as_bytes(), &hash.0.password_hash())
            .is_ok(),
        None => {
            if let Some(empty) = EMPTY_HASH.as_ref() {
                let _ = DEFAULT_HASHER.verify_password(password.as_bytes(), &empty.0.password_hash());
            }
            false
        }
    }
}
