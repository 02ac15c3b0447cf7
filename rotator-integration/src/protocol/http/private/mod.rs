use crate::error::TransportError;
use crate::protocol::http::{BuildStrategy, rest::RestRequest};
use hmac::Mac;

/// Encoders that transform the raw signature bytes into the `String` format a
/// venue expects.
pub mod encoder;

use encoder::Encoder;

/// Venue specific signing logic.
///
/// Implementors assemble the canonical payload to sign for a given
/// [`RestRequest`] (injecting timestamps, receive windows, etc.) and decide
/// how the finished signature is attached to the outgoing request.
pub trait Signer {
    /// Prepared signing material for a single request.
    type Config<'a>
    where
        Self: 'a;

    /// Assemble the canonical payload to sign from the provided [`RestRequest`].
    fn config<'a, Request>(&'a self, request: &Request) -> Result<Self::Config<'a>, TransportError>
    where
        Request: RestRequest;

    /// Feed the canonical payload bytes into the provided [`Mac`].
    fn add_bytes_to_sign<M>(mac: &mut M, config: &Self::Config<'_>)
    where
        M: Mac;

    /// Attach the encoded signature and any mandatory headers, producing the
    /// final [`reqwest::Request`].
    fn build_signed_request<Request>(
        config: Self::Config<'_>,
        builder: reqwest::RequestBuilder,
        signature: String,
    ) -> Result<reqwest::Request, TransportError>
    where
        Request: RestRequest;
}

/// Generic signing [`BuildStrategy`] composed of venue [`Signer`] logic, a
/// cloneable [`Mac`] seeded with the API secret, and a signature [`Encoder`].
#[derive(Debug, Clone)]
pub struct RequestSigner<Sig, HmacMac, SignatureEncoder> {
    signer: Sig,
    mac: HmacMac,
    encoder: SignatureEncoder,
}

impl<Sig, HmacMac, SignatureEncoder> RequestSigner<Sig, HmacMac, SignatureEncoder> {
    pub fn new(signer: Sig, mac: HmacMac, encoder: SignatureEncoder) -> Self {
        Self {
            signer,
            mac,
            encoder,
        }
    }
}

impl<Sig, HmacMac, SignatureEncoder> BuildStrategy for RequestSigner<Sig, HmacMac, SignatureEncoder>
where
    Sig: Signer,
    HmacMac: Mac + Clone,
    SignatureEncoder: Encoder,
{
    fn build<Request>(
        &self,
        request: &Request,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Request, TransportError>
    where
        Request: RestRequest,
    {
        let config = self.signer.config(request)?;

        let mut mac = self.mac.clone();
        Sig::add_bytes_to_sign(&mut mac, &config);
        let signature = self.encoder.encode(mac.finalize().into_bytes());

        Sig::build_signed_request::<Request>(config, builder, signature)
    }
}
