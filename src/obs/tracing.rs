// crates.io
use tracing::{Instrument, Span, instrument::Instrumented};
// self
use crate::{_prelude::*, obs::CallKind};

/// A service call wrapped in its [`CallSpan`].
pub type InstrumentedCall<F> = Instrumented<F>;

/// The `zvelo_client.call` span opened around each outbound call.
#[derive(Clone, Debug)]
pub struct CallSpan {
	span: Span,
}
impl CallSpan {
	/// Opens a span for `kind` issued from `stage` (`json`, `rpc`, or a token grant).
	pub fn new(kind: CallKind, stage: &'static str) -> Self {
		let span = tracing::info_span!("zvelo_client.call", call = kind.as_str(), stage);

		Self { span }
	}

	/// Runs `fut` inside the span; the span is re-entered on every poll.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedCall<Fut>
	where
		Fut: Future,
	{
		fut.instrument(self.span.clone())
	}
}
