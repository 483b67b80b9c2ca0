pub mod card;
pub mod issue;
pub mod user;
