//! minipki CLI application.
//!
//! This binary creates a root CA, issues server and client certificates
//! signed by it, and inspects issued material.

use clap::{Args, Parser, Subcommand};
use minipki::cert::issue::{create_ca, issue_from_ca_files, IssueFromFiles};
use minipki::cert::loader::load;
use minipki::crypto::encryption::is_encrypted;
use minipki::error::{PkiError, Result};
use minipki::storage::files::write_bundle;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing_subscriber::EnvFilter;

const SECONDS_PER_HOUR: u64 = 3600;

#[derive(Parser)]
#[command(name = "minipki")]
#[command(about = "Minimal private PKI for mutual TLS", long_about = None)]
struct Cli {
    /// Log filter, e.g. "debug" or "minipki=trace" (default: RUST_LOG, then "info")
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a self-signed root CA
    Ca {
        /// Common Name of the CA
        #[arg(long)]
        cn: String,

        /// Destination directory
        #[arg(short = 'd', long = "dest", default_value = "ssl")]
        dest: PathBuf,

        /// Certificate file name
        #[arg(long, alias = "certName", default_value = "ca.pem")]
        cert_name: String,

        /// Private key file name
        #[arg(long, alias = "keyName", default_value = "ca.key")]
        key_name: String,

        /// Validity in hours
        #[arg(long, default_value_t = 87600)]
        exp: u64,
    },

    /// Issue a server certificate signed by the CA
    #[command(alias = "serverCert")]
    ServerCert {
        #[command(flatten)]
        issue: IssueArgs,

        /// Certificate file name
        #[arg(long, alias = "certFileName", default_value = "srv.pem")]
        cert_file_name: String,

        /// Private key file name
        #[arg(long, alias = "keyFileName", default_value = "srv.key")]
        key_file_name: String,

        /// DNS subject alternative names
        #[arg(long, alias = "sansDns", value_delimiter = ',')]
        sans_dns: Vec<String>,

        /// IP subject alternative names
        #[arg(long, alias = "sansIp", value_delimiter = ',')]
        sans_ip: Vec<IpAddr>,
    },

    /// Issue a client certificate signed by the CA
    #[command(alias = "clientCert")]
    ClientCert {
        #[command(flatten)]
        issue: IssueArgs,

        /// Certificate file name
        #[arg(long, alias = "certFileName", default_value = "client.pem")]
        cert_file_name: String,

        /// Private key file name
        #[arg(long, alias = "keyFileName", default_value = "client.key")]
        key_file_name: String,
    },

    /// Print the content of a certificate and check its key
    Read {
        /// Certificate file
        #[arg(short = 'c', long)]
        cert: PathBuf,

        /// Private key file
        #[arg(short = 'k', long)]
        key: PathBuf,

        /// Password of an encrypted key (prompted for when needed)
        #[arg(long)]
        password: Option<String>,
    },
}

#[derive(Args)]
struct IssueArgs {
    /// CA private key file
    #[arg(long, alias = "caKey")]
    ca_key: PathBuf,

    /// CA certificate file
    #[arg(long, alias = "caCert")]
    ca_cert: PathBuf,

    /// Password of an encrypted CA key (prompted for when needed)
    #[arg(long, alias = "caKeyPassword")]
    ca_key_password: Option<String>,

    /// Common Name of the new certificate
    #[arg(long, alias = "certCn")]
    cert_cn: String,

    /// Destination directory
    #[arg(short = 'd', long = "dest", default_value = "ssl")]
    dest: PathBuf,

    /// Validity in hours
    #[arg(long, default_value_t = 87600)]
    exp: u64,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    match cli.command {
        Commands::Ca {
            cn,
            dest,
            cert_name,
            key_name,
            exp,
        } => {
            let bundle = create_ca(&cn, SystemTime::now(), hours(exp))?;
            let written = write_bundle(&dest, &cert_name, &key_name, &bundle)?;

            println!("✓ Created root CA: {}", cn);
            println!("  Certificate: {}", written.cert_path.display());
            println!("  Private key: {}", written.key_path.display());
            println!("  Valid for: {} hours", exp);
        }
        Commands::ServerCert {
            issue,
            cert_file_name,
            key_file_name,
            sans_dns,
            sans_ip,
        } => {
            handle_issue(issue, cert_file_name, key_file_name, sans_dns, sans_ip)?;
        }
        Commands::ClientCert {
            issue,
            cert_file_name,
            key_file_name,
        } => {
            handle_issue(issue, cert_file_name, key_file_name, Vec::new(), Vec::new())?;
        }
        Commands::Read {
            cert,
            key,
            password,
        } => {
            handle_read(&cert, &key, password)?;
        }
    }

    Ok(())
}

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn handle_issue(
    args: IssueArgs,
    cert_file_name: String,
    key_file_name: String,
    dns_names: Vec<String>,
    ip_addresses: Vec<IpAddr>,
) -> Result<()> {
    let ca_key_password = resolve_password(&args.ca_key, args.ca_key_password)?;

    let request = IssueFromFiles {
        ca_key_path: args.ca_key,
        ca_cert_path: args.ca_cert,
        ca_key_password,
        subject_cn: args.cert_cn,
        dns_names,
        ip_addresses,
        not_before: SystemTime::now(),
        duration: hours(args.exp),
        dest: args.dest,
        cert_file_name,
        key_file_name,
    };
    let written = issue_from_ca_files(&request)?;

    println!("✓ Issued certificate: {}", request.subject_cn);
    println!("  Certificate: {}", written.cert_path.display());
    println!("  Private key: {}", written.key_path.display());
    println!("  Signed by: CA ({})", request.ca_cert_path.display());
    println!("  Valid for: {} hours", args.exp);

    Ok(())
}

fn handle_read(cert_path: &Path, key_path: &Path, password: Option<String>) -> Result<()> {
    let password = resolve_password(key_path, password)?;
    let loaded = load(key_path, &password, cert_path)?;
    let cert = &loaded.certificate;
    let descriptor = cert.descriptor();

    let ips: Vec<String> = descriptor
        .ip_addresses
        .iter()
        .map(|ip| ip.to_string())
        .collect();

    println!("Subject:      {}", cert.subject());
    println!("Issuer:       {}", cert.issuer());
    println!("Serial:       {}", descriptor.serial_number);
    println!("Is CA:        {}", descriptor.is_ca);
    println!("Self-signed:  {}", cert.is_self_signed());
    println!("Not before:   {}", format_time(descriptor.not_before));
    println!("Not after:    {}", format_time(descriptor.not_after));
    println!("DNS names:    {}", descriptor.dns_names.join(", "));
    println!("IP addresses: {}", ips.join(", "));
    println!(
        "Key matches:  {}",
        cert.public_key() == loaded.key.public_key()
    );

    Ok(())
}

/// Use the given password, or prompt for one if the key file is encrypted.
fn resolve_password(key_path: &Path, password: Option<String>) -> Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }

    let contents = std::fs::read(key_path).map_err(|e| PkiError::io(key_path, e))?;
    match pem::parse(&contents) {
        Ok(block) if is_encrypted(&block) => {
            rpassword::prompt_password(format!("Enter password for {}: ", key_path.display()))
                .map_err(|e| PkiError::io(key_path, e))
        }
        _ => Ok(String::new()),
    }
}

fn hours(exp: u64) -> Duration {
    Duration::from_secs(exp.saturating_mul(SECONDS_PER_HOUR))
}

fn format_time(time: SystemTime) -> String {
    chrono::DateTime::<chrono::Utc>::from(time)
        .format("%Y-%m-%d %H:%M:%S UTC")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_cert_camel_case_flags() {
        let cli = Cli::try_parse_from([
            "minipki",
            "serverCert",
            "--caKey",
            "ssl/ca.key",
            "--caCert",
            "ssl/ca.pem",
            "--certCn",
            "svc.local",
            "--sansDns",
            "svc.local,api.local",
            "--sansIp",
            "127.0.0.1",
            "--certFileName",
            "svc.pem",
            "--keyFileName",
            "svc.key",
        ])
        .unwrap();

        match cli.command {
            Commands::ServerCert {
                issue,
                cert_file_name,
                key_file_name,
                sans_dns,
                sans_ip,
            } => {
                assert_eq!(issue.ca_key, PathBuf::from("ssl/ca.key"));
                assert_eq!(issue.ca_cert, PathBuf::from("ssl/ca.pem"));
                assert_eq!(issue.cert_cn, "svc.local");
                assert_eq!(issue.dest, PathBuf::from("ssl"));
                assert_eq!(issue.exp, 87600);
                assert_eq!(cert_file_name, "svc.pem");
                assert_eq!(key_file_name, "svc.key");
                assert_eq!(sans_dns, vec!["svc.local", "api.local"]);
                assert_eq!(sans_ip, vec!["127.0.0.1".parse::<IpAddr>().unwrap()]);
            }
            _ => panic!("Expected ServerCert"),
        }
    }

    #[test]
    fn test_client_cert_kebab_case_flags() {
        let cli = Cli::try_parse_from([
            "minipki",
            "client-cert",
            "--ca-key",
            "ca.key",
            "--ca-cert",
            "ca.pem",
            "--cert-cn",
            "client",
        ])
        .unwrap();

        match cli.command {
            Commands::ClientCert {
                issue,
                cert_file_name,
                ..
            } => {
                assert_eq!(issue.cert_cn, "client");
                assert_eq!(cert_file_name, "client.pem");
            }
            _ => panic!("Expected ClientCert"),
        }
    }

    #[test]
    fn test_ca_camel_case_flags() {
        let cli = Cli::try_parse_from([
            "minipki", "ca", "--cn", "root", "--certName", "root.pem", "--keyName", "root.key",
        ])
        .unwrap();

        match cli.command {
            Commands::Ca {
                cn,
                cert_name,
                key_name,
                ..
            } => {
                assert_eq!(cn, "root");
                assert_eq!(cert_name, "root.pem");
                assert_eq!(key_name, "root.key");
            }
            _ => panic!("Expected Ca"),
        }
    }
}
