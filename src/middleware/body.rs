use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::{Body, Bytes};
use http_body::{Body as HttpBody, Frame, SizeHint};

use super::observer::Transaction;

/// Response body that counts data bytes as frames stream past and closes
/// the transaction when the body ends, errors, or is dropped.
///
/// Frames are forwarded untouched and in order.
pub struct CountingBody {
    inner: Body,
    txn: Option<Transaction>,
}

impl CountingBody {
    pub fn new(inner: Body, txn: Transaction) -> Self {
        Self {
            inner,
            txn: Some(txn),
        }
    }

    fn finish(&mut self) {
        if let Some(txn) = self.txn.take() {
            txn.complete();
        }
    }
}

impl HttpBody for CountingBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = &mut *self;
        let polled = Pin::new(&mut this.inner).poll_frame(cx);

        match &polled {
            Poll::Ready(Some(Ok(frame))) => {
                if let (Some(data), Some(txn)) = (frame.data_ref(), this.txn.as_mut()) {
                    txn.bytes_written(data.len());
                }
            }
            Poll::Ready(Some(Err(_))) | Poll::Ready(None) => this.finish(),
            Poll::Pending => {}
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
