use super::types::PinStatusCode;
use serde::{de, Deserialize, Deserializer};

impl<'de> Deserialize<'de> for PinStatusCode {
    fn deserialize<D>(deserializer: D) -> core::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct CodeVisitor;

        impl<'de> de::Visitor<'de> for CodeVisitor {
            type Value = PinStatusCode;

            fn expecting(&self, formatter: &mut core::fmt::Formatter) -> core::fmt::Result {
                formatter.write_str("a +CPIN status code")
            }

            fn visit_bytes<E>(self, value: &[u8]) -> core::result::Result<Self::Value, E>
            where
                E: de::Error,
            {
                match value.trim_ascii() {
                    b"READY" => Ok(PinStatusCode::Ready),
                    b"SIM PIN" => Ok(PinStatusCode::SimPin),
                    b"SIM PUK" => Ok(PinStatusCode::SimPuk),
                    b"PH_SIM PIN" | b"PH-SIM PIN" => Ok(PinStatusCode::PhSimPin),
                    b"PH_SIM PUK" | b"PH-SIM PUK" => Ok(PinStatusCode::PhSimPuk),
                    b"SIM PIN2" => Ok(PinStatusCode::SimPin2),
                    b"SIM PUK2" => Ok(PinStatusCode::SimPuk2),
                    b"NOT READY" => Ok(PinStatusCode::NotReady),
                    b"NOT INSERTED" => Ok(PinStatusCode::NotInserted),
                    _ => {
                        let value =
                            core::str::from_utf8(value).unwrap_or("\u{fffd}\u{fffd}\u{fffd}");
                        Err(de::Error::unknown_variant(value, VARIANTS))
                    }
                }
            }

            fn visit_str<E>(self, value: &str) -> core::result::Result<Self::Value, E>
            where
                E: de::Error,
            {
                self.visit_bytes(value.as_bytes())
            }
        }

        const VARIANTS: &[&str] = &[
            "READY",
            "SIM PIN",
            "SIM PUK",
            "PH_SIM PIN",
            "PH_SIM PUK",
            "SIM PIN2",
            "SIM PUK2",
            "NOT READY",
            "NOT INSERTED",
        ];

        deserializer.deserialize_bytes(CodeVisitor)
    }
}
