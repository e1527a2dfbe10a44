/// Generates `Display`, `FromStr`, and `Serialize`/`Deserialize` impls for
/// simple string enums.
///
/// # Forms
///
/// - `str_enum!(Enum, norm, ErrVariant, "msg", ...)`
///
/// `ErrVariant` is the [`ConnectorError`](crate::error::ConnectorError)
/// tuple variant produced for unrecognised input.
///
/// # Normalization modes
///
/// - `lowercase`: `trim().to_lowercase()`
/// - `lowercase_nodot`: `trim().to_lowercase()` with one leading `.` removed
macro_rules! str_enum {
    ($enum_name:ident, $norm:ident, $err_kind:ident, $err_msg:literal,
        $( $variant:ident => $display:literal $(, $alias:literal)* );+ $(;)?
    ) => {
        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let s = match self {
                    $( Self::$variant => $display, )+
                };
                f.write_str(s)
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = crate::error::ConnectorError;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                let normalized = str_enum!(@normalize $norm s);
                match normalized.as_str() {
                    $( $display $(| $alias)* => Ok(Self::$variant), )+
                    other => Err(crate::error::ConnectorError::$err_kind(
                        format!("{}: '{}'", $err_msg, other),
                    )),
                }
            }
        }

        impl serde::Serialize for $enum_name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> serde::Deserialize<'de> for $enum_name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };

    (@normalize lowercase $s:ident) => { $s.trim().to_lowercase() };
    (@normalize lowercase_nodot $s:ident) => {{
        let lower = $s.trim().to_lowercase();
        lower.strip_prefix('.').map(str::to_string).unwrap_or(lower)
    }};
}
