pub mod dispatch;
pub mod flows;
pub mod template;

pub use dispatch::{EmailDispatcher, MailTransport, SendError, SmtpMailer};
pub use flows::EmailFlow;
