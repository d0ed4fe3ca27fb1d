//! Entities - identified objects consumed or owned by a battle

mod question;

pub use question::{Question, QuestionDeck};
