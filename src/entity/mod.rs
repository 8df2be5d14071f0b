pub mod ai_chats;
pub mod chatbot;
pub mod farms;
pub mod predictions;
pub mod users;
