//! Mailbox polling loop.
//!
//! One poll cycle walks the mailbox newest-first and stops at the first
//! message not newer than the stored watermark. Only messages from the
//! configured sender are taken; each accepted message is parsed and handed
//! to the store as a single atomic unit, so a persistence failure never
//! poisons the other messages of the cycle.

use chrono::{DateTime, Utc};
use mail_parser::{MessageParser, MimeHeaders};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use stk_db::models::CreateEmail;

use crate::corrector::CorrectionSource;
use crate::error::IngestError;
use crate::store::{IngestStore, ParsedAttachment};
use crate::transport::MailTransport;
use crate::{issuer, registry};

/// What kind of extracts a mailbox carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxPurpose {
    /// Sales registry extracts, pipe-delimited.
    Registry,
    /// Card issuer extracts, comma-delimited with a header line.
    Issuer,
}

impl MailboxPurpose {
    /// Source-type tag stored with each message.
    #[must_use]
    pub fn type_id(self) -> i32 {
        match self {
            MailboxPurpose::Registry => 1,
            MailboxPurpose::Issuer => 2,
        }
    }
}

/// Static configuration of one polled mailbox.
#[derive(Debug, Clone)]
pub struct MailboxConfig {
    /// Only messages from this address are taken.
    pub expected_from: String,
    pub purpose: MailboxPurpose,
    /// Watermark used before any message has been stored.
    pub init_date: DateTime<Utc>,
}

/// Envelope data of an accepted message.
#[derive(Debug)]
struct Envelope {
    message_id: String,
    from_address: String,
    received_at: DateTime<Utc>,
    /// Attachment filename and raw contents.
    attachments: Vec<(String, Vec<u8>)>,
}

/// Decision for one fetched message during the newest-first descent.
#[derive(Debug)]
enum Triage {
    Accept(Envelope),
    Skip(&'static str),
    /// Reached a message not newer than the watermark.
    Stop,
}

/// Classify one raw message against the watermark and expected sender.
fn triage(raw: &[u8], watermark: DateTime<Utc>, expected_from: &str) -> Triage {
    let Some(message) = MessageParser::default().parse(raw) else {
        return Triage::Skip("unparseable message");
    };

    let Some(received_at) = message
        .date()
        .and_then(|d| DateTime::from_timestamp(d.to_timestamp(), 0))
    else {
        return Triage::Skip("missing date header");
    };
    if received_at <= watermark {
        return Triage::Stop;
    }

    let Some(from_address) = message
        .from()
        .and_then(|a| a.first())
        .and_then(|a| a.address())
        .map(str::to_string)
    else {
        return Triage::Skip("missing sender address");
    };
    if !from_address.eq_ignore_ascii_case(expected_from) {
        return Triage::Skip("unexpected sender");
    }

    // Zero attachment parts is legal; the bare message is still persisted
    // so it advances the watermark instead of being refetched forever.
    let attachments: Vec<(String, Vec<u8>)> = message
        .attachments()
        .map(|part| {
            (
                part.attachment_name().unwrap_or("attachment").to_string(),
                part.contents().to_vec(),
            )
        })
        .collect();

    Triage::Accept(Envelope {
        message_id: message.message_id().unwrap_or_default().to_string(),
        from_address,
        received_at,
        attachments,
    })
}

/// Polls one mailbox and feeds accepted messages through the parsers into
/// the store.
pub struct Receiver<T, S, C> {
    transport: Mutex<T>,
    store: S,
    corrections: C,
    config: MailboxConfig,
}

impl<T, S, C> Receiver<T, S, C>
where
    T: MailTransport,
    S: IngestStore,
    C: CorrectionSource,
{
    pub fn new(transport: T, store: S, corrections: C, config: MailboxConfig) -> Self {
        Self {
            transport: Mutex::new(transport),
            store,
            corrections,
            config,
        }
    }

    /// Run one poll cycle. Returns whether any stored message yielded at
    /// least one parsed person record.
    ///
    /// The transport lock is held for the whole connect/use/disconnect scope,
    /// so concurrent cycles serialize on the session. Disconnect always runs;
    /// a failed disconnect is logged and not retried.
    pub async fn poll_cycle(&self) -> Result<bool, IngestError> {
        let watermark = self
            .store
            .watermark()
            .await?
            .unwrap_or(self.config.init_date);

        let mut transport = self.transport.lock().await;
        let result = self.poll_locked(&mut *transport, watermark).await;
        if let Err(err) = transport.quit().await {
            warn!(error = %err, "mailbox disconnect failed");
        }
        result
    }

    async fn poll_locked(
        &self,
        transport: &mut T,
        watermark: DateTime<Utc>,
    ) -> Result<bool, IngestError> {
        transport.connect().await?;
        let count = transport.stat().await?;
        debug!(count, %watermark, "mailbox polled");

        let mut new_data = false;
        for index in (1..=count).rev() {
            let raw = match transport.retr(index).await {
                Ok(raw) => raw,
                Err(err) => {
                    warn!(index, error = %err, "message fetch failed");
                    continue;
                }
            };

            match triage(&raw, watermark, &self.config.expected_from) {
                Triage::Stop => break,
                Triage::Skip(reason) => debug!(index, reason, "message skipped"),
                Triage::Accept(envelope) => match self.process(raw, envelope).await {
                    Ok(records) => {
                        if records > 0 {
                            new_data = true;
                        }
                    }
                    Err(err) => warn!(index, error = %err, "message rejected"),
                },
            }
        }

        Ok(new_data)
    }

    /// Parse every attachment and persist the message atomically. Returns
    /// the number of person records the message yielded.
    async fn process(&self, raw: Vec<u8>, envelope: Envelope) -> Result<usize, IngestError> {
        let mut parsed = Vec::with_capacity(envelope.attachments.len());
        for (filename, contents) in &envelope.attachments {
            match self.config.purpose {
                MailboxPurpose::Registry => {
                    let records = registry::parse_document(contents, &self.corrections).await;
                    parsed.push(ParsedAttachment::Registry {
                        filename: filename.clone(),
                        records,
                    });
                }
                MailboxPurpose::Issuer => {
                    let document = issuer::parse_document(contents)?;
                    parsed.push(ParsedAttachment::Issuer {
                        kind: document.kind,
                        from_date: envelope.received_at.date_naive(),
                        records: document.records,
                    });
                }
            }
        }

        let records: usize = parsed.iter().map(ParsedAttachment::record_count).sum();
        info!(
            message_id = %envelope.message_id,
            received_at = %envelope.received_at,
            attachments = parsed.len(),
            records,
            "message accepted"
        );

        self.store
            .store_message(
                CreateEmail {
                    type_id: self.config.purpose.type_id(),
                    message_id: envelope.message_id,
                    from_address: envelope.from_address,
                    received_at: envelope.received_at,
                    parsed_at: Utc::now(),
                    file: raw,
                },
                parsed,
            )
            .await?;
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use chrono::TimeZone;
    use encoding_rs::WINDOWS_1251;

    use stk_db::DbError;

    use super::*;
    use crate::corrector::testing::MemoryCorrections;
    use crate::transport::TransportError;

    const SENDER: &str = "registry@erc.example";
    const REGISTRY_ROW: &str =
        "11223344595|01.05.1960|Иванов|Иван|Иванович|2022|1|оранжевая|10|500|15.03.2022|12|Петрова А.А.";

    /// Build a raw multipart message with one windows-1251 attachment.
    fn raw_message(from: &str, date: &str, attachment: &str) -> Vec<u8> {
        let encoded = STANDARD.encode(WINDOWS_1251.encode(attachment).0);
        format!(
            "From: {from}\r\n\
             To: inbox@stk.example\r\n\
             Message-ID: <{date}@erc.example>\r\n\
             Date: {date}\r\n\
             Subject: extract\r\n\
             MIME-Version: 1.0\r\n\
             Content-Type: multipart/mixed; boundary=\"b1\"\r\n\
             \r\n\
             --b1\r\n\
             Content-Type: text/plain\r\n\
             \r\n\
             see attached\r\n\
             --b1\r\n\
             Content-Type: application/octet-stream; name=\"extract.txt\"\r\n\
             Content-Disposition: attachment; filename=\"extract.txt\"\r\n\
             Content-Transfer-Encoding: base64\r\n\
             \r\n\
             {encoded}\r\n\
             --b1--\r\n"
        )
        .into_bytes()
    }

    /// Build a plain single-part message carrying no attachments.
    fn raw_message_without_attachment(from: &str, date: &str) -> Vec<u8> {
        format!(
            "From: {from}\r\n\
             To: inbox@stk.example\r\n\
             Message-ID: <{date}@erc.example>\r\n\
             Date: {date}\r\n\
             Subject: heads-up\r\n\
             MIME-Version: 1.0\r\n\
             Content-Type: text/plain\r\n\
             \r\n\
             nothing attached\r\n"
        )
        .into_bytes()
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2022, 3, 15, hour, 0, 0).unwrap()
    }

    #[test]
    fn triage_accepts_new_message_with_attachment() {
        let raw = raw_message(SENDER, "Tue, 15 Mar 2022 12:00:00 +0000", REGISTRY_ROW);
        match triage(&raw, at(10), SENDER) {
            Triage::Accept(envelope) => {
                assert_eq!(envelope.from_address, SENDER);
                assert_eq!(envelope.received_at, at(12));
                assert_eq!(envelope.attachments.len(), 1);
                assert_eq!(envelope.attachments[0].0, "extract.txt");
                let text = WINDOWS_1251.decode(&envelope.attachments[0].1).0;
                assert!(text.contains("11223344595"));
            }
            other => panic!("expected accept, got {other:?}"),
        }
    }

    #[test]
    fn triage_stops_at_watermark() {
        let raw = raw_message(SENDER, "Tue, 15 Mar 2022 10:00:00 +0000", REGISTRY_ROW);
        assert!(matches!(triage(&raw, at(10), SENDER), Triage::Stop));
        assert!(matches!(triage(&raw, at(11), SENDER), Triage::Stop));
    }

    #[test]
    fn triage_skips_unexpected_sender() {
        let raw = raw_message("spam@other.example", "Tue, 15 Mar 2022 12:00:00 +0000", REGISTRY_ROW);
        assert!(matches!(triage(&raw, at(10), SENDER), Triage::Skip(_)));
    }

    #[test]
    fn triage_skips_garbage() {
        assert!(matches!(
            triage(b"\xff\xfe not a message", at(10), SENDER),
            Triage::Skip(_)
        ));
    }

    /// Scripted mailbox: messages ordered oldest (index 1) to newest.
    struct ScriptedTransport {
        messages: Vec<Vec<u8>>,
        fetched: Arc<AtomicUsize>,
        quits: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl MailTransport for ScriptedTransport {
        async fn connect(&mut self) -> Result<(), TransportError> {
            Ok(())
        }

        async fn stat(&mut self) -> Result<u32, TransportError> {
            Ok(self.messages.len() as u32)
        }

        async fn retr(&mut self, index: u32) -> Result<Vec<u8>, TransportError> {
            self.fetched.fetch_add(1, Ordering::SeqCst);
            Ok(self.messages[index as usize - 1].clone())
        }

        async fn quit(&mut self) -> Result<(), TransportError> {
            self.quits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        watermark: Option<DateTime<Utc>>,
        stored: std::sync::Mutex<Vec<CreateEmail>>,
    }

    #[async_trait]
    impl IngestStore for MemoryStore {
        async fn watermark(&self) -> Result<Option<DateTime<Utc>>, DbError> {
            Ok(self.watermark)
        }

        async fn store_message(
            &self,
            message: CreateEmail,
            _attachments: Vec<ParsedAttachment>,
        ) -> Result<(), DbError> {
            self.stored.lock().unwrap().push(message);
            Ok(())
        }
    }

    fn config() -> MailboxConfig {
        MailboxConfig {
            expected_from: SENDER.to_string(),
            purpose: MailboxPurpose::Registry,
            init_date: at(0),
        }
    }

    #[tokio::test]
    async fn cycle_stores_only_messages_newer_than_watermark() {
        let fetched = Arc::new(AtomicUsize::new(0));
        let quits = Arc::new(AtomicUsize::new(0));
        let transport = ScriptedTransport {
            messages: vec![
                raw_message(SENDER, "Tue, 15 Mar 2022 08:00:00 +0000", REGISTRY_ROW),
                raw_message(SENDER, "Tue, 15 Mar 2022 10:00:00 +0000", REGISTRY_ROW),
                raw_message(SENDER, "Tue, 15 Mar 2022 12:00:00 +0000", REGISTRY_ROW),
                raw_message(SENDER, "Tue, 15 Mar 2022 14:00:00 +0000", REGISTRY_ROW),
            ],
            fetched: fetched.clone(),
            quits: quits.clone(),
        };
        let receiver = Receiver::new(
            transport,
            MemoryStore {
                watermark: Some(at(10)),
                ..Default::default()
            },
            MemoryCorrections::default(),
            config(),
        );

        let found = receiver.poll_cycle().await.unwrap();

        assert!(found);
        let stored = receiver.store.stored.lock().unwrap();
        assert_eq!(stored.len(), 2);
        // Newest first, descent stopped at the 10:00 message.
        assert_eq!(stored[0].received_at, at(14));
        assert_eq!(stored[1].received_at, at(12));
        assert_eq!(fetched.load(Ordering::SeqCst), 3);
        assert_eq!(quits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cycle_uses_initial_date_when_store_is_empty() {
        let transport = ScriptedTransport {
            messages: vec![raw_message(
                SENDER,
                "Tue, 15 Mar 2022 08:00:00 +0000",
                REGISTRY_ROW,
            )],
            fetched: Arc::new(AtomicUsize::new(0)),
            quits: Arc::new(AtomicUsize::new(0)),
        };
        let receiver = Receiver::new(
            transport,
            MemoryStore::default(),
            MemoryCorrections::default(),
            config(),
        );

        assert!(receiver.poll_cycle().await.unwrap());
        assert_eq!(receiver.store.stored.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unparsed_records_store_the_message_but_report_nothing_new() {
        let transport = ScriptedTransport {
            // The only attachment line has the wrong column count, so the
            // parser drops it and the message yields zero records.
            messages: vec![raw_message(
                SENDER,
                "Tue, 15 Mar 2022 12:00:00 +0000",
                "a|b|c",
            )],
            fetched: Arc::new(AtomicUsize::new(0)),
            quits: Arc::new(AtomicUsize::new(0)),
        };
        let receiver = Receiver::new(
            transport,
            MemoryStore::default(),
            MemoryCorrections::default(),
            config(),
        );

        let found = receiver.poll_cycle().await.unwrap();

        assert!(!found);
        assert_eq!(receiver.store.stored.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn attachmentless_message_is_persisted_and_advances_the_watermark() {
        let transport = ScriptedTransport {
            messages: vec![raw_message_without_attachment(
                SENDER,
                "Tue, 15 Mar 2022 12:00:00 +0000",
            )],
            fetched: Arc::new(AtomicUsize::new(0)),
            quits: Arc::new(AtomicUsize::new(0)),
        };
        let receiver = Receiver::new(
            transport,
            MemoryStore::default(),
            MemoryCorrections::default(),
            config(),
        );

        let found = receiver.poll_cycle().await.unwrap();

        assert!(!found);
        let stored = receiver.store.stored.lock().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].received_at, at(12));
    }

    #[tokio::test]
    async fn cycle_reports_no_new_data() {
        let transport = ScriptedTransport {
            messages: vec![],
            fetched: Arc::new(AtomicUsize::new(0)),
            quits: Arc::new(AtomicUsize::new(0)),
        };
        let receiver = Receiver::new(
            transport,
            MemoryStore::default(),
            MemoryCorrections::default(),
            config(),
        );

        assert!(!receiver.poll_cycle().await.unwrap());
    }
}
