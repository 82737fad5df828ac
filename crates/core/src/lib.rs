//! Wire types and capability traits shared by the windlass adapter.
//!
//! Provides the OpenAI chat shapes (`Message`, `Request`, `Response`,
//! `StreamChunk`, `Usage`), the stored conversation record
//! (`StoredMessage`), and the collaborator traits the adapter consumes:
//! [`Model`] for transport, [`Summarizer`] for context refinement and
//! [`History`] for ancestor lookup.

pub use history::{Conversation, History, MAX_CHAIN_DEPTH, ROOT_MESSAGE_ID, ancestors};
pub use message::{
    Attachment, Content, ContentPart, ImageDetail, ImageUrl, Message, MessageBuilder, Role,
    StoredMessage,
};
pub use model::{Model, Summarizer, Summary};
pub use request::Request;
pub use response::{Choice, CompletionTokensDetails, Delta, FinishReason, Response, Usage};
pub use stream::{StreamChoice, StreamChunk};

mod history;
mod message;
mod model;
mod request;
mod response;
mod stream;
