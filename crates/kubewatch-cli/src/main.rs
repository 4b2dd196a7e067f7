mod commands;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::{EXIT_CANCELLED, EXIT_CONFIG_ERROR, EXIT_FAILURE, EXIT_NOT_READY};
use kubewatch_client::api::DEFAULT_NAMESPACE;
use kubewatch_client::CancelToken;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "kubewatch",
    version,
    about = "Create pods, wait for them to leave Pending, and watch them change"
)]
struct Cli {
    /// API server base URL (overrides KUBEWATCH_HOST and the config file).
    #[arg(long, global = true)]
    host: Option<String>,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create a pod from a JSON file and wait until it leaves Pending.
    CreatePod {
        /// Path to the pod definition (JSON).
        file: PathBuf,
        /// Namespace to create the pod in (defaults to the file's, then "default").
        #[arg(long, short)]
        namespace: Option<String>,
        /// Seconds to wait before giving up and deleting the pod.
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Wait for an existing pod to leave Pending.
    AwaitPod {
        name: String,
        /// Version returned when the pod was created.
        #[arg(long)]
        resource_version: String,
        #[arg(long, short, default_value = DEFAULT_NAMESPACE)]
        namespace: String,
        /// Seconds to wait.
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Print change events for a pod until the stream ends or Ctrl-C.
    WatchPod {
        name: String,
        /// Only changes after this version are reported.
        #[arg(long)]
        resource_version: String,
        #[arg(long, short, default_value = DEFAULT_NAMESPACE)]
        namespace: String,
    },
    /// List pods in a namespace.
    ListPods {
        #[arg(long, short, default_value = DEFAULT_NAMESPACE)]
        namespace: String,
        /// Label selector, e.g. "app=web".
        #[arg(long, short = 'l')]
        selector: Option<String>,
    },
    /// Delete a pod.
    DeletePod {
        name: String,
        #[arg(long, short, default_value = DEFAULT_NAMESPACE)]
        namespace: String,
    },
    /// Print a pod's log.
    Logs {
        name: String,
        #[arg(long, short, default_value = DEFAULT_NAMESPACE)]
        namespace: String,
    },
    /// List service endpoints.
    ListEndpoints {
        #[arg(long, short, default_value = DEFAULT_NAMESPACE)]
        namespace: String,
        #[arg(long, short = 'l')]
        selector: Option<String>,
    },
    /// Point a replication controller at a new image version.
    SetImage {
        /// Replication controller name.
        controller: String,
        image: String,
        version: String,
        #[arg(long, short, default_value = DEFAULT_NAMESPACE)]
        namespace: String,
    },
    /// Show a secret.
    GetSecret {
        name: String,
        #[arg(long, short, default_value = DEFAULT_NAMESPACE)]
        namespace: String,
    },
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
    /// Generate man pages in the specified directory.
    ManPages {
        /// Output directory for man pages.
        #[arg(default_value = "man")]
        dir: PathBuf,
    },
}

/// First Ctrl-C cancels the running operation, a second one exits.
fn install_signal_handler(cancel: &CancelToken) {
    let cancel = cancel.clone();
    let _ = ctrlc::set_handler(move || {
        if cancel.is_cancelled() {
            std::process::exit(i32::from(EXIT_FAILURE));
        }
        cancel.cancel();
        eprintln!("\ninterrupt received, cancelling...");
    });
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("KUBEWATCH_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let cancel = CancelToken::new();
    install_signal_handler(&cancel);

    let host = cli.host.as_deref();
    let json = cli.json;

    let result = match cli.command {
        Commands::CreatePod {
            file,
            namespace,
            timeout,
        } => commands::create_pod::run(host, &file, namespace.as_deref(), timeout, &cancel, json),
        Commands::AwaitPod {
            name,
            resource_version,
            namespace,
            timeout,
        } => commands::await_pod::run(
            host,
            &namespace,
            &name,
            &resource_version,
            timeout,
            &cancel,
            json,
        ),
        Commands::WatchPod {
            name,
            resource_version,
            namespace,
        } => commands::watch_pod::run(host, &namespace, &name, &resource_version, &cancel, json),
        Commands::ListPods {
            namespace,
            selector,
        } => commands::list_pods::run(host, &namespace, selector.as_deref(), json),
        Commands::DeletePod { name, namespace } => {
            commands::delete_pod::run(host, &namespace, &name, json)
        }
        Commands::Logs { name, namespace } => commands::logs::run(host, &namespace, &name),
        Commands::ListEndpoints {
            namespace,
            selector,
        } => commands::list_endpoints::run(host, &namespace, selector.as_deref(), json),
        Commands::SetImage {
            controller,
            image,
            version,
            namespace,
        } => commands::set_image::run(host, &namespace, &controller, &image, &version, json),
        Commands::GetSecret { name, namespace } => {
            commands::get_secret::run(host, &namespace, &name, json)
        }
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
        Commands::ManPages { dir } => commands::man_pages::run::<Cli>(&dir),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            let code = if msg.starts_with("cancelled") {
                EXIT_CANCELLED
            } else if msg.starts_with("timed out waiting for") {
                EXIT_NOT_READY
            } else if msg.starts_with("client config error:") {
                EXIT_CONFIG_ERROR
            } else {
                EXIT_FAILURE
            };
            ExitCode::from(code)
        }
    }
}
