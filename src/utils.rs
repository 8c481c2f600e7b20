//! Outils transversaux: validation des entrées, hachage des mots de passe
//! et messages d'erreur publics.

pub mod error_messages;
pub mod input_validation;
pub mod password_utils;
