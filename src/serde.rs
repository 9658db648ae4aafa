//! # Serde module for Sketch
//!
//! This module provides serde-based (serialization and deserialization) features for
//! `Sketch`. It uses `serde`'s custom serialization and deserialization mechanisms.
//!
//! A `Sketch` is serialized as the tuple `(precision, registers)`, with registers written
//! as a byte sequence exactly `2^precision` long.
//!
//! During deserialization the tuple is validated through `Sketch::from_bytes`, so an
//! out-of-range precision or a register sequence of the wrong length is rejected
//! instead of producing a malformed sketch.
//!
//! Refer to the serde documentation for more details on custom serialization and deserialization:
//! - [Serialization](https://serde.rs/impl-serialize.html)
//! - [Deserialization](https://serde.rs/impl-deserialize.html)
use serde::de::Error;
use serde::ser::SerializeTuple;
use serde::{Deserialize, Serialize};

use crate::sketch::Sketch;

impl Serialize for Sketch {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut tup = serializer.serialize_tuple(2)?;
        tup.serialize_element(&self.precision())?;
        tup.serialize_element(self.registers())?;
        tup.end()
    }
}

impl<'de> Deserialize<'de> for Sketch {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let (precision, registers): (u8, Vec<u8>) = Deserialize::deserialize(deserializer)?;
        Sketch::from_bytes(precision, &registers).map_err(D::Error::custom)
    }
}
