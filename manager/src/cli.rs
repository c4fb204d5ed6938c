use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "msm", version, about = "Manage Minecraft server instances")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start an instance in a detached session
    Start { name: String },

    /// Ask an instance to shut down, forcing termination after the timeout
    Stop { name: String },

    /// Stop an instance, wait for it to settle, then start it again
    Restart { name: String },

    /// Show status of one instance, or of all when no name is given
    Status { name: Option<String> },

    /// List all instances with their status
    List,

    /// Live resource view, refreshed until interrupted
    Monitor,

    /// Send a console line to a running instance
    Send {
        name: String,
        #[arg(required = true, trailing_var_arg = true)]
        line: Vec<String>,
    },

    /// Adjust an instance record (takes effect on next start)
    Tune {
        name: String,
        /// Heap size in megabytes
        #[arg(long)]
        ram: Option<u32>,
        /// CPU cores the server may use
        #[arg(long)]
        cores: Option<u32>,
        /// Reassign the network port
        #[arg(long, conflicts_with = "auto_port")]
        port: Option<u16>,
        /// Reassign to the next free port
        #[arg(long)]
        auto_port: bool,
    },
}
