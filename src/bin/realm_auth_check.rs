//!
//! realm_auth_check
//! ----------------
//! Runs one credential attempt against the configured realm, or hashes a password for the
//! users file. Configuration comes from REALM_AUTH_* environment variables or `--config`.

use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use tracing_subscriber::{fmt, EnvFilter};

use realm_auth::config::AuthConfig;
use realm_auth::identity::{bound_subject, hash_password, AttributeMap, PublicKey};

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} [--config <file.json>] [--realm <name>] password <user> <password>\n  {program} [--config <file.json>] [--realm <name>] key <user> <public key>\n  {program} hash <password>\n\nEnvironment:\n  REALM_AUTH_REALM        realm name (default karaf)\n  REALM_AUTH_USERS_FILE   users.properties path\n  REALM_AUTH_KEYS_FILE    keys.properties path\n  RUST_LOG                log filter (default info; use debug to see denial reasons)"
    );
}

// argv[0] may be absent when the process is spawned with an empty argument vector.
fn split_program(mut args: Vec<String>) -> (String, Vec<String>) {
    if args.is_empty() {
        return ("realm_auth_check".to_string(), args);
    }
    let program = args.remove(0);
    (program, args)
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow!(e.to_string()))?;
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let (program, args) = split_program(env::args().collect());

    let mut config_path: Option<PathBuf> = None;
    let mut realm: Option<String> = None;
    let mut rest: Vec<String> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                if i + 1 >= args.len() { eprintln!("--config requires a value"); print_usage(&program); std::process::exit(2); }
                config_path = Some(PathBuf::from(&args[i + 1]));
                i += 2;
            }
            "--realm" => {
                if i + 1 >= args.len() { eprintln!("--realm requires a value"); print_usage(&program); std::process::exit(2); }
                realm = Some(args[i + 1].clone());
                i += 2;
            }
            "-h" | "--help" => { print_usage(&program); return Ok(()); }
            _ => { rest.push(args[i].clone()); i += 1; }
        }
    }

    let command = rest.first().map(|s| s.as_str());
    if command == Some("hash") {
        let password = rest.get(1).ok_or_else(|| anyhow!("hash requires a password"))?;
        println!("{}", hash_password(password)?);
        return Ok(());
    }

    let mut config = match &config_path {
        Some(p) => AuthConfig::from_json_file(p)?,
        None => AuthConfig::from_env(),
    };
    if let Some(r) = realm { config.realm = r; }

    let (Some(user), Some(credential)) = (rest.get(1), rest.get(2)) else {
        print_usage(&program);
        std::process::exit(2);
    };
    let auth = config.build_authenticator()?;
    let session = AttributeMap::new();
    let outcome = match command {
        Some("password") => auth.evaluate_password(user, credential, &session),
        Some("key") => {
            let key = PublicKey::parse(credential).context("reading public key argument")?;
            auth.evaluate_publickey(user, &key, &session)
        }
        _ => { print_usage(&program); std::process::exit(2); }
    };

    if outcome.is_admitted() {
        let roles = bound_subject(&session)
            .map(|s| s.roles().map(str::to_string).collect::<Vec<_>>().join(","))
            .unwrap_or_default();
        println!("admitted realm={} user={} roles={}", auth.realm(), user, roles);
        Ok(())
    } else {
        println!("denied");
        std::process::exit(1);
    }
}
