use std::env;
use std::fmt::Debug;
use std::str::FromStr;

#[derive(Clone, Copy)]
pub struct EnvVarSpec {
    pub key: &'static str,
    pub sensitive: bool,
}

#[derive(Clone, Copy)]
pub struct EnvVarValue<TVal> {
    pub spec: &'static EnvVarSpec,
    pub value: TVal,
}

impl EnvVarSpec {
    pub fn default<TVal: FromStr>(&'static self, default: TVal) -> EnvVarValue<TVal> {
        let as_optional = self.optional();
        EnvVarValue {
            spec: as_optional.spec,
            value: as_optional.value.unwrap_or(default),
        }
    }

    pub fn optional<TVal: FromStr>(&'static self) -> EnvVarValue<Option<TVal>> {
        let value = match env::var(self.key) {
            Ok(val) => {
                let parsed = val
                    .parse()
                    .unwrap_or_else(|_e| panic!("Failed to parse env var {}", self.key));
                Some(parsed)
            }
            Err(e) => {
                tracing::debug!("Failed reading env var {}: {e:?}", self.key);
                None
            }
        };
        EnvVarValue { spec: self, value }
    }
}

impl<TVal: Debug> Debug for EnvVarValue<TVal> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.spec.sensitive {
            f.write_str("***")
        } else {
            f.write_fmt(format_args!("{:?}", self.value))
        }
    }
}

pub const LOG_FORMAT: EnvVarSpec = EnvVarSpec {
    key: "LOG_FORMAT",
    sensitive: false,
};
pub const TRACE_DIR: EnvVarSpec = EnvVarSpec {
    key: "TRACE_DIR",
    sensitive: false,
};
