/// Defines an abstract `RestRequest` that can be executed by a fully
/// configurable `RestClient`, alongside the signing and parsing machinery the
/// client composes.
pub mod http;
