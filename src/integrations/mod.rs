pub mod account_api;
pub mod nlu;
pub mod openai;
