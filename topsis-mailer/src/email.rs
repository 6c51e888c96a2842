//! Email service for delivering ranking results.

use lettre::{
    AsyncFileTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{
        Attachment, Body, Mailbox, MultiPart, SinglePart,
        header::{ContentTransferEncoding, ContentType},
    },
    transport::smtp::authentication::Credentials,
};
use std::path::Path;

use crate::{config::EmailConfig, errors::Error};

const RESULT_BODY: &str =
    "Hello,\n\nPlease find attached the result file generated from your data.\n\nBest,\nTopsis Web Service";

pub struct EmailService {
    transport: EmailTransport,
    from_email: String,
    from_name: String,
    reply_to: Option<String>,
    subject: String,
}

enum EmailTransport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    File(AsyncFileTransport<Tokio1Executor>),
}

impl EmailService {
    pub fn new(email_config: &EmailConfig) -> Result<Self, Error> {
        let transport = match &email_config.transport {
            crate::config::EmailTransportConfig::Smtp {
                host,
                port,
                username,
                password,
                use_tls,
            } => {
                if !use_tls {
                    tracing::warn!("SMTP TLS is disabled - this is not recommended for production");
                }

                let smtp_builder = if *use_tls {
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                } else {
                    Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host))
                }
                .map_err(|e| Error::Internal {
                    operation: format!("create SMTP transport: {e}"),
                })?
                .port(*port)
                .credentials(Credentials::new(username.clone(), password.clone()));

                EmailTransport::Smtp(smtp_builder.build())
            }
            crate::config::EmailTransportConfig::File { path } => {
                // Use file transport for development/testing
                let emails_dir = Path::new(path);
                if !emails_dir.exists() {
                    std::fs::create_dir_all(emails_dir).map_err(|e| Error::Internal {
                        operation: format!("create emails directory: {e}"),
                    })?;
                }
                EmailTransport::File(AsyncFileTransport::<Tokio1Executor>::new(emails_dir))
            }
        };

        Ok(Self {
            transport,
            from_email: email_config.from_email.clone(),
            from_name: email_config.from_name.clone(),
            reply_to: email_config.reply_to.clone(),
            subject: email_config.subject.clone(),
        })
    }

    /// Mail the result file at `attachment_path` to `to_email`.
    ///
    /// The file is attached as `application/octet-stream`, base64 encoded, under its own file name.
    pub async fn send_result(&self, to_email: &str, attachment_path: &Path) -> Result<(), Error> {
        let contents = tokio::fs::read(attachment_path).await.map_err(|e| Error::Internal {
            operation: format!("read attachment {}: {e}", attachment_path.display()),
        })?;
        let filename = attachment_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "result.csv".to_string());

        let message = self.build_result_message(to_email, &filename, contents)?;
        self.send(message).await
    }

    fn build_result_message(&self, to_email: &str, filename: &str, contents: Vec<u8>) -> Result<Message, Error> {
        let from = format!("{} <{}>", self.from_name, self.from_email)
            .parse::<Mailbox>()
            .map_err(|e| Error::Internal {
                operation: format!("parse from email: {e}"),
            })?;

        let to = to_email.trim().parse::<Mailbox>().map_err(|e| Error::Internal {
            operation: format!("parse to email: {e}"),
        })?;

        let mut builder = Message::builder().from(from).to(to).subject(self.subject.as_str());

        if let Some(reply_to) = &self.reply_to {
            let reply_to = reply_to.parse::<Mailbox>().map_err(|e| Error::Internal {
                operation: format!("parse reply-to email: {e}"),
            })?;
            builder = builder.reply_to(reply_to);
        }

        let body = Body::new_with_encoding(contents, ContentTransferEncoding::Base64).map_err(|_| Error::Internal {
            operation: "encode attachment".to_string(),
        })?;
        let attachment = Attachment::new(filename.to_string()).body(body, ContentType::parse("application/octet-stream").map_err(|e| {
            Error::Internal {
                operation: format!("build attachment content type: {e}"),
            }
        })?);

        builder
            .multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::plain(RESULT_BODY.to_string()))
                    .singlepart(attachment),
            )
            .map_err(|e| Error::Internal {
                operation: format!("build email message: {e}"),
            })
    }

    async fn send(&self, message: Message) -> Result<(), Error> {
        match &self.transport {
            EmailTransport::Smtp(smtp) => {
                smtp.send(message).await.map_err(|e| Error::Internal {
                    operation: format!("send SMTP email: {e}"),
                })?;
            }
            EmailTransport::File(file) => {
                file.send(message).await.map_err(|e| Error::Internal {
                    operation: format!("send file email: {e}"),
                })?;
            }
        }

        Ok(())
    }
}
