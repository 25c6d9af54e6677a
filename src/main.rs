//! # qust-operator
//!
//! Command-line entry point.
//!
//! ## Usage
//!
//! ```bash
//! # Render every patch of a CR into its manifests root
//! qust-operator --cr-file qliksense.yaml render
//!
//! # Same, with the CR passed through the environment
//! YAML_CONF="$(cat qliksense.yaml)" qust-operator render
//!
//! # Rotate ejson and application keys without rendering
//! qust-operator --cr-file qliksense.yaml rotate-keys
//!
//! # Remove the CR's key backup from the cluster
//! qust-operator --cr-file qliksense.yaml delete-backup
//!
//! # Print the CustomResourceDefinition
//! qust-operator crd
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use kube::core::CustomResourceExt;
use kube::Client;
use qust_operator::config::OperatorConfig;
use qust_operator::controller::{render_all_patches, KeyLifecycle};
use qust_operator::crd::{KeysAction, Qliksense};
use qust_operator::keys::DefaultKeyGenerator;
use qust_operator::observability::{self, metrics};
use qust_operator::resolver::KubeSecretResolver;
use qust_operator::state::KubeSecretStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("BUILD_GIT_HASH"),
    ", built ",
    env!("BUILD_DATETIME"),
    ")"
);

/// Renders Qliksense custom resources into kustomize overlay patches
#[derive(Parser)]
#[command(name = "qust-operator", version, long_version = LONG_VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Custom resource file; defaults to the YAML_CONF document
    #[arg(long, global = true)]
    cr_file: Option<PathBuf>,

    /// Directory holding the ejson private key file
    #[arg(long, global = true, env = "EJSON_KEYDIR")]
    ejson_key_dir: Option<PathBuf>,

    /// Write the Prometheus text exposition here on exit
    #[arg(long, global = true)]
    metrics_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Render configs, secrets, transformers and keys
    Render {
        /// Override the CR's rotateKeys policy
        #[arg(long, value_name = "POLICY")]
        rotate_keys: Option<String>,
    },
    /// Force-rotate ejson and application keys and back them up
    RotateKeys,
    /// Delete the CR's key backup object
    DeleteBackup,
    /// Print the Qliksense CustomResourceDefinition
    Crd,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Before anything touches the kube client
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        bail!("Failed to install rustls crypto provider");
    }

    observability::init_tracing();
    metrics::register_metrics().context("Failed to register metrics")?;

    let cli = Cli::parse();
    let mut config = OperatorConfig::from_env();
    if let Some(dir) = &cli.ejson_key_dir {
        config = config.with_ejson_key_dir(dir);
    }

    let result = run(&cli, config).await;

    if let Some(path) = &cli.metrics_file {
        let text = metrics::gather_text()?;
        std::fs::write(path, text)
            .with_context(|| format!("Failed to write metrics to {}", path.display()))?;
    }
    result
}

async fn run(cli: &Cli, config: OperatorConfig) -> Result<()> {
    if matches!(cli.command, Commands::Crd) {
        let crd = serde_yaml::to_string(&Qliksense::crd()).context("Failed to serialize CRD")?;
        print!("{crd}");
        return Ok(());
    }

    let cr = load_cr(cli, &config)?;
    let namespace = cr
        .backup_namespace()
        .unwrap_or(&config.default_namespace)
        .to_string();
    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client. Ensure kubeconfig is configured.")?;

    let store = Arc::new(KubeSecretStore::new(&client, &namespace));
    let lifecycle = KeyLifecycle::new(config, store, Arc::new(DefaultKeyGenerator));

    match &cli.command {
        Commands::Render { rotate_keys } => {
            let action = rotate_keys
                .as_deref()
                .map_or_else(|| cr.spec.keys_action(), KeysAction::parse_lenient);
            let resolver = KubeSecretResolver::new(&client, &namespace);
            let summary = render_all_patches(&cr, action, &lifecycle, &resolver)
                .await
                .context("Failed to render patches")?;
            info!(
                ejson_public_key = %summary.ejson.public_key(),
                keys = ?summary.keys,
                "Render complete"
            );
        }
        Commands::RotateKeys => {
            let (ejson, outcome) = lifecycle
                .reconcile_keys(&cr, KeysAction::ForceRotate)
                .await
                .context("Failed to rotate keys")?;
            info!(ejson_public_key = %ejson.public_key(), keys = ?outcome, "Keys rotated");
        }
        Commands::DeleteBackup => {
            let deleted = lifecycle
                .delete_backup(&cr)
                .await
                .context("Failed to delete backup")?;
            info!(deleted, object = %cr.backup_object_name(), "Backup deletion finished");
        }
        Commands::Crd => {}
    }
    Ok(())
}

fn load_cr(cli: &Cli, config: &OperatorConfig) -> Result<Qliksense> {
    let content = match (&cli.cr_file, &config.cr_yaml) {
        (Some(path), _) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        (None, Some(inline)) => inline.clone(),
        (None, None) => bail!("No custom resource given: pass --cr-file or set YAML_CONF"),
    };
    serde_yaml::from_str(&content).context("Failed to parse the Qliksense custom resource")
}
