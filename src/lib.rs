//! # The CAN Translator Crate
//! The `cantranslator` crate translates between raw CAN frames and named values. Signals are decoded from received frames and published to an output sink, values written by name are packed into outgoing frames, and OBD-II diagnostic requests are scheduled, sent and matched with their responses.
//!
//! ## Signal Example
//!
//! Decoding a 4 bit field starting at bit 2 of the first byte, scaled by a factor and an offset.
//!
//! ```rust
//! use cantranslator::can::Frame;
//! use cantranslator::output::OutputMessage;
//! use cantranslator::signals::{Signal, SignalTable};
//!
//! let signal = Signal::new(0, 0x10, "powertrain_torque", 2, 4).with_scaling(1001.0, -30000.0);
//! let mut table = SignalTable::new(vec![signal]);
//!
//! let frame = Frame::new(0, 0x10.into(), &[0xEB]).unwrap();
//! let mut output: Vec<OutputMessage> = vec![];
//! table.translate(&frame, &mut output);
//! assert_eq!(output, vec![OutputMessage::named("powertrain_torque", (-19990.0).into())]);
//! ```
//!
//! ## Diagnostics Example
//!
//! The [`translator::AsyncTranslator`] runs the scheduling loop on a background thread. Requests are added while it runs, and every decoded response shows up on the output stream.
//!
//! ```rust
//! use cantranslator::can::CanAdapter;
//! use cantranslator::diagnostics::{DiagnosticRequest, RequestOptions};
//! use cantranslator::translator::{AsyncTranslator, Translator, TranslatorConfig};
//! use cantranslator::StreamExt;
//!
//! async fn diagnostics_example<T: CanAdapter + Send + 'static>(adapter: T) {
//!     let translator = Translator::new(TranslatorConfig::default(), vec![]);
//!     let translator = AsyncTranslator::new(adapter, translator);
//!     let mut stream = translator.recv();
//!
//!     let request = DiagnosticRequest::new(0x7df, 0x01).with_pid(0x0c);
//!     translator.add_request(0, request, RequestOptions::recurring(1.0)).await.unwrap();
//!
//!     while let Some(message) = stream.next().await {
//!         println!("{:?}", message);
//!     }
//! }
//! ```

pub mod can;
pub mod diagnostics;
mod error;
pub mod isotp;
pub mod output;
pub mod signals;
pub mod translator;

pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;

pub use tokio_stream::{Stream, StreamExt};
