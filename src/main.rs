// src/main.rs
mod cert;
mod config;
mod discovery;
mod kubeconfig;
mod utils;

use cert::{
    service_account::ServiceAccountGenerator, verification::CertificateVerifier,
    CertificateOperations, KeyAlgorithm, PkiCatalog, PkiError,
};
use clap::{Parser, Subcommand};
use config::{PkiConfig, DEFAULT_SERVICE_IP};
use kubeconfig::{kubeconfig_identities, AccessBundleBuilder, KubeConfigGenerator};
use std::{io, net::IpAddr, path::PathBuf};
use utils::logging::{ConsoleLogger, FileLogger, Logger, MultiLogger};

#[derive(Parser)]
#[command(name = "kube-pki-init", version, about = "Bootstrap the PKI of a Kubernetes control-plane node")]
pub struct Args {
    /// Prefix for etc/kubernetes and etc/kubernetes/pki
    #[arg(long, env = "ROOT_DIR", default_value = "/")]
    pub root_dir: String,
    /// First address of the service CIDR [default: 10.96.0.1]
    #[arg(long, env = "SERVICE_IP")]
    pub service_ip: Option<IpAddr>,
    /// Node address; detected from the first e* interface when omitted
    #[arg(long)]
    pub lan_ip: Option<IpAddr>,
    /// API server URL [default: https://<lan-ip>:6443]
    #[arg(long)]
    pub api_server: Option<String>,
    #[arg(long)]
    pub hostname: Option<String>,
    /// rsa or ecdsa
    #[arg(long)]
    pub key_algorithm: Option<KeyAlgorithm>,
    /// JSON settings file; command-line values override it
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Write the resolved settings to this JSON file before running
    #[arg(long)]
    pub save_config: Option<PathBuf>,
    #[arg(long)]
    pub log_file: Option<PathBuf>,
    #[arg(short, long)]
    pub debug: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Create CAs, leaf certificates, the service-account key and kubeconfigs
    Certs,
    /// Regenerate kubeconfigs from the existing root CA
    Config,
    /// Print the detected LAN address
    LanIp,
    /// Check every certificate chains to its CA and list what is on disk
    Verify,
}

fn build_logger(args: &Args) -> Result<Box<dyn Logger>, PkiError> {
    let console: Box<dyn Logger> = Box::new(ConsoleLogger::new(args.debug));
    match &args.log_file {
        Some(path) => {
            let file = FileLogger::new(path, args.debug).map_err(|e| PkiError::io(path, e))?;
            Ok(Box::new(MultiLogger::new(vec![console, Box::new(file)])))
        }
        None => Ok(console),
    }
}

fn lan_ip(args: &Args) -> Result<IpAddr, PkiError> {
    match args.lan_ip {
        Some(ip) => Ok(ip),
        None => Ok(IpAddr::V4(discovery::discover_lan_ip()?)),
    }
}

/// Builds the single configuration value everything else receives.
fn build_config(args: &Args) -> Result<PkiConfig, PkiError> {
    let mut config = match &args.config {
        Some(path) => PkiConfig::load_from_file(path)?,
        None => {
            let hostname = match &args.hostname {
                Some(name) => name.clone(),
                None => discovery::discover_hostname()?,
            };
            PkiConfig::new(&args.root_dir, &hostname, lan_ip(args)?)
                .with_service_ip(args.service_ip.unwrap_or(DEFAULT_SERVICE_IP))
        }
    };

    if args.config.is_some() {
        if let Some(hostname) = &args.hostname {
            config.hostname = hostname.clone();
        }
        if let Some(ip) = args.lan_ip {
            config.lan_ip = ip;
            config.api_server = PkiConfig::default_api_server(ip);
        }
        if let Some(ip) = args.service_ip {
            config.service_ip = ip;
        }
    }
    if let Some(api_server) = &args.api_server {
        config = config.with_api_server(api_server);
    }
    if let Some(algorithm) = args.key_algorithm {
        config.key_algorithm = algorithm;
    }

    config.validate()?;
    Ok(config)
}

fn write_kubeconfigs(ops: &mut CertificateOperations, config: &PkiConfig) -> Result<(), PkiError> {
    ops.log("Generating kubeconfig files");
    let builder =
        AccessBundleBuilder::new(&config.cluster_name, &config.api_server, config.key_algorithm);
    let identities = kubeconfig_identities(&config.hostname);
    let bundles = builder.build_all(ops, &identities)?;

    let generator = KubeConfigGenerator::new(&config.kubeconfig_dir);
    for (bundle, identity) in bundles.iter().zip(&identities) {
        let path = generator.write(bundle, &identity.file_name)?;
        ops.log(&format!("Wrote {} for {}", path.display(), identity.client_name));
    }
    Ok(())
}

fn verify(logger: Box<dyn Logger>, config: &PkiConfig) -> Result<(), PkiError> {
    let mut verifier = CertificateVerifier::new(logger, &config.pki_dir);
    let checked = verifier.verify_catalog(&PkiCatalog::kubernetes(config))?;
    ServiceAccountGenerator::new(&config.pki_dir).verify_keypair()?;

    for info in verifier.discover()? {
        println!(
            "{}\t{}\tserial={}\tca={}\texpires={}",
            info.path.display(),
            info.subject,
            info.serial,
            info.is_ca,
            info.not_after.format("%Y-%m-%d")
        );
    }
    println!("{} certificate chains verified", checked);
    Ok(())
}

fn run(args: Args) -> Result<(), PkiError> {
    if args.command == Commands::LanIp {
        println!("{}", lan_ip(&args)?);
        return Ok(());
    }

    let config = build_config(&args)?;
    let mut logger = build_logger(&args)?;
    if let Some(path) = &args.save_config {
        config.save_to_file(path)?;
        logger.log(&format!("Saved settings to {}", path.display()));
    }
    logger.debug_log(&format!(
        "pki_dir={} kubeconfig_dir={} api_server={} service_ip={} hostname={} algorithm={}",
        config.pki_dir.display(),
        config.kubeconfig_dir.display(),
        config.api_server,
        config.service_ip,
        config.hostname,
        config.key_algorithm
    ));

    match args.command {
        Commands::Certs => {
            let mut ops = CertificateOperations::new(logger, &config.pki_dir, config.key_algorithm);
            ops.generate_all(&PkiCatalog::kubernetes(&config))?;
            write_kubeconfigs(&mut ops, &config)
        }
        Commands::Config => {
            let mut ops = CertificateOperations::new(logger, &config.pki_dir, config.key_algorithm);
            write_kubeconfigs(&mut ops, &config)
        }
        Commands::Verify => verify(logger, &config),
        Commands::LanIp => Ok(()),
    }
}

fn main() -> io::Result<()> {
    let args = Args::parse();

    if let Err(err) = run(args) {
        eprintln!("Error: {}", err);
        return Err(err.into());
    }
    Ok(())
}
