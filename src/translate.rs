//! Payload translators.
//!
//! A translator turns the bytes of a `LoadedResource` into a value the
//! factory understands. Translators compose with `then`:
//!
//! ```
//! use reloader::translate::{Translator, Utf8, FnTranslator};
//!
//! let words = Utf8.then(FnTranslator::new(|s: String| {
//!     Ok::<_, reloader::error::TranslateError>(s.split_whitespace().count())
//! }));
//! assert_eq!(words.translate(b"a b c".to_vec()).unwrap(), 3);
//! ```

use std::marker::PhantomData;

use serde::de::DeserializeOwned;

use crate::error::TranslateError;

/// Raw bytes handed to the first translator of a pipeline.
pub type Payload = Vec<u8>;

pub trait Translator<In>: Send + Sync {
    type Output;

    fn translate(&self, input: In) -> Result<Self::Output, TranslateError>;

    /// Feed this translator's output into `next`.
    fn then<N>(self, next: N) -> Chain<Self, N>
    where
        Self: Sized,
        N: Translator<Self::Output>,
    {
        Chain {
            first: self,
            second: next,
        }
    }
}

/// Two translators run back to back.
#[derive(Debug, Clone)]
pub struct Chain<A, B> {
    first: A,
    second: B,
}

impl<In, A, B> Translator<In> for Chain<A, B>
where
    A: Translator<In>,
    B: Translator<A::Output>,
{
    type Output = B::Output;

    fn translate(&self, input: In) -> Result<Self::Output, TranslateError> {
        self.second.translate(self.first.translate(input)?)
    }
}

/// Bytes to `String`, rejecting invalid UTF-8.
#[derive(Debug, Clone, Copy, Default)]
pub struct Utf8;

impl Translator<Payload> for Utf8 {
    type Output = String;

    fn translate(&self, input: Payload) -> Result<String, TranslateError> {
        Ok(String::from_utf8(input)?)
    }
}

/// JSON document to `T`.
pub struct Json<T>(PhantomData<fn() -> T>);

impl<T> Json<T> {
    pub fn new() -> Self {
        Json(PhantomData)
    }
}

impl<T> Default for Json<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DeserializeOwned> Translator<Payload> for Json<T> {
    type Output = T;

    fn translate(&self, input: Payload) -> Result<T, TranslateError> {
        Ok(serde_json::from_slice(&input)?)
    }
}

/// TOML document to `T`.
pub struct Toml<T>(PhantomData<fn() -> T>);

impl<T> Toml<T> {
    pub fn new() -> Self {
        Toml(PhantomData)
    }
}

impl<T> Default for Toml<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DeserializeOwned> Translator<Payload> for Toml<T> {
    type Output = T;

    fn translate(&self, input: Payload) -> Result<T, TranslateError> {
        let text = String::from_utf8(input)?;
        Ok(toml::from_str(&text)?)
    }
}

/// Translator from a closure.
pub struct FnTranslator<F, In, Out> {
    f: F,
    _types: PhantomData<fn(In) -> Out>,
}

impl<F, In, Out> FnTranslator<F, In, Out>
where
    F: Fn(In) -> Result<Out, TranslateError>,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            _types: PhantomData,
        }
    }
}

impl<F, In, Out> Translator<In> for FnTranslator<F, In, Out>
where
    F: Fn(In) -> Result<Out, TranslateError> + Send + Sync,
{
    type Output = Out;

    fn translate(&self, input: In) -> Result<Out, TranslateError> {
        (self.f)(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Limits {
        max: u32,
    }

    #[test]
    fn utf8_rejects_invalid_bytes() {
        let err = Utf8.translate(vec![0xff, 0xfe]).unwrap_err();
        assert!(matches!(err, TranslateError::Utf8(_)));
    }

    #[test]
    fn json_and_toml_decode_structs() {
        let json = Json::<Limits>::new().translate(br#"{"max": 5}"#.to_vec()).unwrap();
        let toml = Toml::<Limits>::new().translate(b"max = 5".to_vec()).unwrap();
        assert_eq!(json, Limits { max: 5 });
        assert_eq!(toml, json);
    }

    #[test]
    fn chain_stops_at_first_failure() {
        let pipeline = Utf8.then(FnTranslator::new(|s: String| {
            s.trim()
                .parse::<u32>()
                .map_err(|e| TranslateError::Other(e.to_string()))
        }));
        assert_eq!(pipeline.translate(b" 42 ".to_vec()).unwrap(), 42);
        assert!(pipeline.translate(b"forty".to_vec()).is_err());
        assert!(pipeline.translate(vec![0xff]).is_err());
    }
}
