use {
    crate::{i18n, sheet::SheetRow},
    lettre::{
        message::Mailbox, transport::smtp::authentication::Credentials, Address, AsyncTransport,
    },
    serde::Deserialize,
    thiserror::Error,
};

/// The SMTP account confirmation mails are sent from.
#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    /// The email from which confirmation mails will be sent.
    pub email: Address,

    /// Password for the email.
    pub email_creds: String,

    /// The SMTP server which the email belongs to.
    pub smtp_server: String,
}

#[derive(Debug, Error)]
pub enum SendMailError {
    #[error("SMTP error sending mail: {0}")]
    LettreError(#[from] lettre::transport::smtp::Error),
    #[error("Error while building email: {0}")]
    BuildError(#[from] lettre::error::Error),
    #[error("Invalid recipient address: {0}")]
    AddressError(#[from] lettre::address::AddressError),
}

/// Builds the payment confirmation for the representative of `row`, in the language they
/// registered in.
pub fn confirmation_mail(
    row: &SheetRow,
    from: Address,
    sender_name: &str,
) -> Result<lettre::Message, SendMailError> {
    let locale = row.language;
    let to: Address = row.email.parse()?;

    let body = i18n::format(
        locale,
        "mail.body",
        &[
            ("name", row.name.clone()),
            ("amount", row.amount.to_string()),
            ("count", row.total_participants.to_string()),
            ("session", row.session_id.clone().unwrap_or_default()),
        ],
    );

    Ok(lettre::Message::builder()
        .from(Mailbox::new(Some(sender_name.to_string()), from))
        .to(Mailbox::new(Some(row.name.clone()), to))
        .subject(i18n::lookup(locale, "mail.subject"))
        .body(body)?)
}

/// Sends the payment confirmation for `row` through the configured account.
pub async fn send_confirmation_mail(
    row: &SheetRow,
    config: &MailConfig,
    sender_name: &str,
) -> Result<(), SendMailError> {
    let email = confirmation_mail(row, config.email.clone(), sender_name)?;

    let creds = Credentials::new(config.email.to_string(), config.email_creds.clone());
    let conn = lettre::AsyncSmtpTransport::<lettre::Tokio1Executor>::relay(&config.smtp_server)?
        .credentials(creds)
        .build();

    conn.send(email).await?;
    Ok(())
}
