//! Manually implement Serialize and Deserialize for SaslMechanisms

use serde::{de, ser};
use amqp_codec::primitives::{Array, Symbol};

use super::SaslMechanisms;

/// Entry in SaslMechanisms that represents a SASL Anonymous mechanism
pub const ANONYMOUS: &str = "ANONYMOUS";

impl Default for SaslMechanisms {
    /// Creates a new instance of SaslMechanisms
    ///
    /// A SASL mechanism ANONYMOUS is included by default
    ///
    /// It is invalid for this list to be null or empty. If the sending peer does not require
    /// its partner to authenticate with it, then it SHOULD send a list of one element with
    /// its value as the SASL mechanism ANONYMOUS.
    fn default() -> Self {
        Self {
            sasl_server_mechanisms: Array::from(vec![Symbol::from(ANONYMOUS)]),
        }
    }
}

impl amqp_codec::serde::ser::Serialize for SaslMechanisms {
    fn serialize<_S>(&self, serializer: _S) -> Result<_S::Ok, _S::Error>
    where
        _S: amqp_codec::serde::ser::Serializer,
    {
        use amqp_codec::serde::ser::SerializeStruct;

        // NOTE: A field which is defined as both multiple and mandatory MUST contain at least one value
        // (i.e. for such a field both null and an array with no entries are invalid).
        if self.sasl_server_mechanisms.0.is_empty() {
            return Err(ser::Error::custom(
                "A field which is defined as both multiple and mandatory MUST contain at least one value"
            ));
        }

        let mut state =
            serializer.serialize_struct(amqp_codec::__constants::DESCRIBED_LIST, 1usize + 1)?;
        state.serialize_field(
            amqp_codec::__constants::DESCRIPTOR,
            &amqp_codec::descriptor::Descriptor::Code(64u64),
        )?;
        state.serialize_field("sasl-server-mechanisms", &self.sasl_server_mechanisms)?;
        state.end()
    }
}

impl<'de> amqp_codec::serde::de::Deserialize<'de> for SaslMechanisms {
    fn deserialize<_D>(deserializer: _D) -> Result<Self, _D::Error>
    where
        _D: amqp_codec::serde::de::Deserializer<'de>,
    {
        #[allow(non_camel_case_types)]
        enum Field {
            sasl_server_mechanisms,
        }
        struct FieldVisitor {}
        impl<'de> amqp_codec::serde::de::Visitor<'de> for FieldVisitor {
            type Value = Field;
            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("field identifier")
            }
            fn visit_str<_E>(self, v: &str) -> Result<Self::Value, _E>
            where
                _E: amqp_codec::serde::de::Error,
            {
                match v {
                    "sasl-server-mechanisms" => Ok(Self::Value::sasl_server_mechanisms),
                    _ => Err(amqp_codec::serde::de::Error::custom("Unknown identifier")),
                }
            }
            fn visit_bytes<_E>(self, v: &[u8]) -> Result<Self::Value, _E>
            where
                _E: amqp_codec::serde::de::Error,
            {
                match v {
                    b if b == "sasl-server-mechanisms".as_bytes() => {
                        Ok(Self::Value::sasl_server_mechanisms)
                    }
                    _ => Err(amqp_codec::serde::de::Error::custom("Unknown identifier")),
                }
            }
        }
        impl<'de> amqp_codec::serde::de::Deserialize<'de> for Field {
            fn deserialize<_D>(deserializer: _D) -> Result<Self, _D::Error>
            where
                _D: amqp_codec::serde::de::Deserializer<'de>,
            {
                deserializer.deserialize_identifier(FieldVisitor {})
            }
        }
        struct Visitor {}
        impl Visitor {
            fn new() -> Self {
                Self {}
            }
        }
        impl<'de> amqp_codec::serde::de::Visitor<'de> for Visitor {
            type Value = SaslMechanisms;
            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("struct amqp:sasl-mechanisms:list")
            }
            fn visit_seq<_A>(self, mut __seq: _A) -> Result<Self::Value, _A::Error>
            where
                _A: amqp_codec::serde::de::SeqAccess<'de>,
            {
                let __descriptor: amqp_codec::descriptor::Descriptor = match __seq.next_element()? {
                    Some(val) => val,
                    None => {
                        return Err(amqp_codec::serde::de::Error::custom("Expecting descriptor"))
                    }
                };
                match __descriptor {
                    amqp_codec::descriptor::Descriptor::Name(__symbol) => {
                        if __symbol.into_inner() != "amqp:sasl-mechanisms:list" {
                            return Err(amqp_codec::serde::de::Error::custom(
                                "Descriptor mismatch",
                            ));
                        }
                    }
                    amqp_codec::descriptor::Descriptor::Code(__c) => {
                        if __c != 64u64 {
                            return Err(amqp_codec::serde::de::Error::custom(
                                "Descriptor mismatch",
                            ));
                        }
                    }
                }
                let sasl_server_mechanisms: Array<Symbol> = match __seq.next_element()? {
                    Some(val) => val,
                    None => {
                        return Err(amqp_codec::serde::de::Error::custom(
                            "Insufficient number of items",
                        ))
                    }
                };
                Ok(SaslMechanisms {
                    sasl_server_mechanisms,
                })
            }
            fn visit_map<_A>(self, mut __map: _A) -> Result<Self::Value, _A::Error>
            where
                _A: amqp_codec::serde::de::MapAccess<'de>,
            {
                let mut sasl_server_mechanisms: Option<Array<Symbol>> = None;
                let __descriptor: amqp_codec::descriptor::Descriptor = match __map.next_key()? {
                    Some(val) => val,
                    None => {
                        return Err(amqp_codec::serde::de::Error::custom(
                            "Expecting__descriptor",
                        ))
                    }
                };
                match __descriptor {
                    amqp_codec::descriptor::Descriptor::Name(__symbol) => {
                        if __symbol.into_inner() != "amqp:sasl-mechanisms:list" {
                            return Err(amqp_codec::serde::de::Error::custom(
                                "Descriptor mismatch",
                            ));
                        }
                    }
                    amqp_codec::descriptor::Descriptor::Code(__c) => {
                        if __c != 64u64 {
                            return Err(amqp_codec::serde::de::Error::custom(
                                "Descriptor mismatch",
                            ));
                        }
                    }
                }
                while let Some(key) = __map.next_key::<Field>()? {
                    match key {
                        Field::sasl_server_mechanisms => {
                            if sasl_server_mechanisms.is_some() {
                                return Err(amqp_codec::serde::de::Error::duplicate_field(
                                    "sasl-server-mechanisms",
                                ));
                            }
                            sasl_server_mechanisms = Some(__map.next_value()?);
                        }
                    }
                }
                let sasl_server_mechanisms: Array<Symbol> = match sasl_server_mechanisms {
                    Some(val) => val,
                    None => {
                        return Err(amqp_codec::serde::de::Error::custom(
                            "Insufficient number of items",
                        ))
                    }
                };
                Ok(SaslMechanisms {
                    sasl_server_mechanisms,
                })
            }
        }
        const FIELDS: &[&str] = &[
            amqp_codec::__constants::DESCRIPTOR,
            "sasl-server-mechanisms",
        ];
        let mechanisms = deserializer.deserialize_struct(
            amqp_codec::__constants::DESCRIBED_LIST,
            FIELDS,
            Visitor::new(),
        )?;

        if mechanisms.sasl_server_mechanisms.0.is_empty() {
            return Err(de::Error::custom(
                "A field which is defined as both multiple and mandatory MUST contain at least one value"
            ));
        }
        Ok(mechanisms)
    }
}
