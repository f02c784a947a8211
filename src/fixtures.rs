#[cfg(test)]
pub mod test {
    use serde::{Deserialize, Serialize};

    use crate::schema::Schema;

    /// A service configuration: a defaulted port, a database section built
    /// from an intersection, and a per-site record.
    pub fn service_schema() -> Schema {
        Schema::object([
            ("port", Schema::integer().with_default(8080)),
            (
                "database",
                Schema::object([
                    ("host", Schema::string()),
                    ("database", Schema::string().optional()),
                    (
                        "options",
                        Schema::partial([("max_pool_size", Schema::integer())]).optional(),
                    ),
                ])
                .and(Schema::partial([
                    ("port", Schema::integer()),
                    ("debug", Schema::boolean()),
                ])),
            ),
            (
                "sites",
                Schema::enum_record(["US", "CA"], Schema::object([("url", Schema::string())]))
                    .optional(),
            ),
        ])
    }

    /// `{foo: string} & {bar?: string}`
    pub fn intersection_schema() -> Schema {
        Schema::object([("foo", Schema::string())])
            .and(Schema::partial([("bar", Schema::string())]))
    }

    /// Every coercible kind, for end-to-end env and template tests.
    pub fn typed_schema() -> Schema {
        Schema::partial([
            ("name", Schema::string()),
            ("ratio", Schema::number()),
            ("workers", Schema::integer()),
            ("enabled", Schema::boolean()),
            ("since", Schema::date()),
            ("mode", Schema::enumeration(["fast", "slow"])),
            ("level", Schema::literal("debug").or(Schema::literal("info"))),
            ("tags", Schema::array(Schema::string())),
            ("pattern", Schema::regex()),
            ("endpoint", Schema::url()),
        ])
    }

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    pub struct ServiceConfig {
        pub port: u16,
        pub database: DatabaseConfig,
    }

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    pub struct DatabaseConfig {
        pub host: String,
        pub database: Option<String>,
        pub port: Option<u16>,
        pub debug: Option<bool>,
    }

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    pub struct CryptoConfig {
        pub key: String,
        pub rounds: u32,
    }

    pub fn crypto_schema() -> Schema {
        Schema::object([
            ("key", Schema::string()),
            ("rounds", Schema::integer().with_default(10)),
        ])
    }
}
