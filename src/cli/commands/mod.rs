pub mod auth;
pub mod logging;

use clap::{
    Arg, ColorChoice, Command,
    builder::styling::{AnsiColor, Effects, Styles},
};

pub const ARG_PORT: &str = "port";
pub const ARG_DSN: &str = "dsn";
pub const ARG_DB_MAX_CONNECTIONS: &str = "db-max-connections";

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("chiave")
        .about("Multi-tenant credential service")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long(ARG_PORT)
                .help("Port to listen on")
                .default_value("8080")
                .env("CHIAVE_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_DSN)
                .short('d')
                .long(ARG_DSN)
                .help("Database connection string")
                .long_help(
                    "SQLite connection string, for example `sqlite://chiave.db`.\n\
                     The file is created if missing and the schema is applied at startup.",
                )
                .env("CHIAVE_DSN")
                .required(true),
        )
        .arg(
            Arg::new(ARG_DB_MAX_CONNECTIONS)
                .long(ARG_DB_MAX_CONNECTIONS)
                .help("Maximum number of pooled database connections")
                .env("CHIAVE_DB_MAX_CONNECTIONS")
                .default_value("5")
                .value_parser(clap::value_parser!(u32).range(1..)),
        );

    let command = auth::with_args(command);
    logging::with_args(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DSN: &str = "sqlite://chiave.db";

    #[test]
    fn test_new() {
        let command = new();

        assert_eq!(command.get_name(), "chiave");
        assert_eq!(
            command.get_about().map(ToString::to_string),
            Some("Multi-tenant credential service".to_string())
        );
        assert_eq!(
            command.get_version().map(ToString::to_string),
            Some(env!("CARGO_PKG_VERSION").to_string())
        );
    }

    #[test]
    fn test_check_args_and_defaults() {
        temp_env::with_vars_unset(
            [
                "CHIAVE_PORT",
                "CHIAVE_TOKEN_TTL_SECONDS",
                "CHIAVE_BCRYPT_COST",
                "CHIAVE_REQUEST_TIMEOUT_SECONDS",
                "CHIAVE_DB_MAX_CONNECTIONS",
            ],
            || {
                let matches = new().get_matches_from(vec![
                    "chiave",
                    "--dsn",
                    DSN,
                    "--admin-key",
                    "s3cret",
                ]);

                assert_eq!(matches.get_one::<u16>(ARG_PORT).copied(), Some(8080));
                assert_eq!(
                    matches.get_one::<String>(ARG_DSN).cloned(),
                    Some(DSN.to_string())
                );
                assert_eq!(
                    matches.get_one::<u32>(ARG_DB_MAX_CONNECTIONS).copied(),
                    Some(5)
                );
                assert_eq!(
                    matches.get_one::<u64>(auth::ARG_TOKEN_TTL_SECONDS).copied(),
                    Some(3600)
                );
                assert_eq!(
                    matches.get_one::<u32>(auth::ARG_BCRYPT_COST).copied(),
                    Some(12)
                );
                assert_eq!(
                    matches
                        .get_one::<u64>(auth::ARG_REQUEST_TIMEOUT_SECONDS)
                        .copied(),
                    Some(10)
                );
            },
        );
    }

    #[test]
    fn test_check_env() {
        temp_env::with_vars(
            [
                ("CHIAVE_PORT", Some("443")),
                ("CHIAVE_DSN", Some(DSN)),
                ("CHIAVE_ADMIN_KEY", Some("from-env")),
                ("CHIAVE_TOKEN_TTL_SECONDS", Some("60")),
                ("CHIAVE_BCRYPT_COST", Some("11")),
                ("CHIAVE_LOG_LEVEL", Some("info")),
            ],
            || {
                let matches = new().get_matches_from(vec!["chiave"]);
                assert_eq!(matches.get_one::<u16>(ARG_PORT).copied(), Some(443));
                assert_eq!(
                    matches.get_one::<String>(ARG_DSN).cloned(),
                    Some(DSN.to_string())
                );
                assert_eq!(
                    matches.get_one::<String>(auth::ARG_ADMIN_KEY).cloned(),
                    Some("from-env".to_string())
                );
                assert_eq!(
                    matches.get_one::<u64>(auth::ARG_TOKEN_TTL_SECONDS).copied(),
                    Some(60)
                );
                assert_eq!(
                    matches.get_one::<u32>(auth::ARG_BCRYPT_COST).copied(),
                    Some(11)
                );
                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    Some(2)
                );
            },
        );
    }

    #[test]
    fn test_check_log_level_env() {
        let levels = ["error", "warn", "info", "debug", "trace"];
        for (index, &level) in levels.iter().enumerate() {
            temp_env::with_vars(
                [
                    ("CHIAVE_LOG_LEVEL", Some(level)),
                    ("CHIAVE_DSN", Some(DSN)),
                    ("CHIAVE_ADMIN_KEY", Some("key")),
                ],
                || {
                    let matches = new().get_matches_from(vec!["chiave"]);
                    assert_eq!(
                        matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                        u8::try_from(index).ok()
                    );
                },
            );
        }
    }

    #[test]
    fn test_check_log_level_verbosity() {
        for index in 0..5 {
            temp_env::with_vars([("CHIAVE_LOG_LEVEL", None::<String>)], || {
                let mut args = vec![
                    "chiave".to_string(),
                    "--dsn".to_string(),
                    DSN.to_string(),
                    "--admin-key".to_string(),
                    "key".to_string(),
                ];

                // Add the appropriate number of "-v" flags based on the index
                if index > 0 {
                    args.push(format!("-{}", "v".repeat(index)));
                }

                let matches = new().get_matches_from(args);

                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    u8::try_from(index).ok()
                );
            });
        }
    }

    #[test]
    fn test_out_of_range_values_fail() {
        temp_env::with_vars_unset(["CHIAVE_BCRYPT_COST", "CHIAVE_TOKEN_TTL_SECONDS"], || {
            let base = ["chiave", "--dsn", DSN, "--admin-key", "key"];

            let below_floor = (crate::auth::password::MIN_PRODUCTION_COST - 1).to_string();
            let result = new().try_get_matches_from(
                base.iter().copied().chain(["--bcrypt-cost", below_floor.as_str()]),
            );
            assert_eq!(
                result.map_err(|e| e.kind()).err(),
                Some(clap::error::ErrorKind::ValueValidation)
            );

            let result =
                new().try_get_matches_from(base.iter().chain(&["--token-ttl-seconds", "0"]));
            assert_eq!(
                result.map_err(|e| e.kind()).err(),
                Some(clap::error::ErrorKind::ValueValidation)
            );
        });
    }

    #[test]
    fn test_missing_required_args_fail() {
        temp_env::with_vars_unset(["CHIAVE_DSN", "CHIAVE_ADMIN_KEY"], || {
            let result = new().try_get_matches_from(vec!["chiave", "--dsn", DSN]);
            assert_eq!(
                result.map_err(|e| e.kind()).err(),
                Some(clap::error::ErrorKind::MissingRequiredArgument)
            );
        });
    }
}
