pub mod error;
pub mod message;
pub mod messages;
pub mod reqrep;
pub mod traits;
pub mod worker;

pub use error::DispatchError;
pub use message::Message;
pub use messages::dispatch::{DispatchReply, DispatchRequest, Outcome};
pub use messages::topics;
pub use reqrep::{DispatchHub, ReplyToken, WorkerEndpoint};
pub use traits::{RequestHandler, RequestSender, WorkerSpawner};
pub use worker::{RandomPolicy, TaskSpawner, WorkerExit, WorkerPolicy, WorkerRunner};
