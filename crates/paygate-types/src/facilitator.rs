//! The verification and settlement capability the payment gate depends on.
//!
//! The paygate never checks signatures or balances itself. It hands the buyer's
//! [`PaymentPayload`](crate::proto::PaymentPayload) to a [`Facilitator`] and only
//! acts on the verdict. Production code talks to a remote facilitator over HTTP;
//! tests plug in a stub.

use std::fmt::{Debug, Display};
use std::sync::Arc;

use crate::proto::{SettleRequest, SettleResponse, VerifyRequest, VerifyResponse};

/// Asynchronous interface of an x402 payment facilitator.
pub trait Facilitator {
    /// The error type returned by this facilitator.
    type Error: Debug + Display;

    /// Verifies a payment payload against the seller's requirements.
    ///
    /// A well-formed but unacceptable payment is reported as
    /// [`VerifyResponse::Invalid`], not as an error.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the facilitator could not be reached or answered garbage.
    fn verify(
        &self,
        request: &VerifyRequest,
    ) -> impl Future<Output = Result<VerifyResponse, Self::Error>> + Send;

    /// Settles a previously verified payment on-chain.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the facilitator could not be reached or answered garbage.
    fn settle(
        &self,
        request: &SettleRequest,
    ) -> impl Future<Output = Result<SettleResponse, Self::Error>> + Send;
}

impl<T: Facilitator> Facilitator for Arc<T> {
    type Error = T::Error;

    fn verify(
        &self,
        request: &VerifyRequest,
    ) -> impl Future<Output = Result<VerifyResponse, Self::Error>> + Send {
        self.as_ref().verify(request)
    }

    fn settle(
        &self,
        request: &SettleRequest,
    ) -> impl Future<Output = Result<SettleResponse, Self::Error>> + Send {
        self.as_ref().settle(request)
    }
}
