use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Agenda open/close change-request tracker")]
pub struct Cli {
    /// Directory holding the request data (defaults to AGENDA_DATA_DIR or ~/.agenda-requests)
    #[clap(long)]
    pub data_dir: Option<PathBuf>,

    /// Acting user name (defaults to $USER)
    #[clap(long, short = 'u')]
    pub user: Option<String>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Submit a doctor-originated request
    Submit {
        /// Doctor name the request is for
        #[clap(long)]
        requester: String,

        /// Day to open or close, as DATE[@HH:MM[@abertura|fechamento]];
        /// repeat for multiple days
        #[clap(long = "day", required = true)]
        days: Vec<String>,

        /// Agenda types, comma-separated (convenio, hsm+)
        #[clap(long)]
        agenda: String,

        /// Free-text note
        #[clap(long)]
        note: Option<String>,

        /// Opaque attachment reference (URL)
        #[clap(long)]
        attachment: Option<String>,
    },

    /// Create a supervisor-originated request (enters the queue already forwarded)
    Create {
        /// Doctor name the request is for
        #[clap(long)]
        requester: String,

        /// Day to open or close, as DATE[@HH:MM[@abertura|fechamento]];
        /// repeat for multiple days
        #[clap(long = "day", required = true)]
        days: Vec<String>,

        /// Agenda types, comma-separated (convenio, hsm+)
        #[clap(long)]
        agenda: String,

        /// Free-text note
        #[clap(long)]
        note: Option<String>,

        /// Opaque attachment reference (URL)
        #[clap(long)]
        attachment: Option<String>,
    },

    /// List requests, optionally filtered
    List {
        /// Substring match on the requester name (case-insensitive)
        #[clap(long)]
        search: Option<String>,

        /// Filter by origin (medico, supervisao)
        #[clap(long)]
        origin: Option<String>,

        /// Filter by day type (abertura, fechamento)
        #[clap(long)]
        r#type: Option<String>,

        /// Filter by agenda type (convenio, hsm+)
        #[clap(long)]
        agenda: Option<String>,

        /// Filter by status (pendente, encaminhada, aprovada, recusada, concluida)
        #[clap(long)]
        status: Option<String>,

        /// Filter by execution state (em-execucao, nao-iniciada)
        #[clap(long)]
        execution: Option<String>,

        /// Earliest submission date, inclusive (YYYY-MM-DD)
        #[clap(long)]
        from: Option<String>,

        /// Latest submission date, inclusive (YYYY-MM-DD)
        #[clap(long)]
        to: Option<String>,
    },

    /// Show full details for one request
    Show {
        /// Request id (UUID or "N/YYYY" number)
        id: String,
    },

    /// Forward a pending request (supervision)
    Forward {
        /// Request id (UUID or "N/YYYY" number)
        id: String,
    },

    /// Approve a forwarded request (directorate)
    Approve {
        /// Request id (UUID or "N/YYYY" number)
        id: String,
    },

    /// Reject a forwarded request (directorate)
    Reject {
        /// Request id (UUID or "N/YYYY" number)
        id: String,
    },

    /// Record a supervision note on a request
    Note {
        /// Request id (UUID or "N/YYYY" number)
        id: String,

        /// Note text
        text: String,
    },

    /// Take execution responsibility for a request (TI)
    Claim {
        /// Request id (UUID or "N/YYYY" number)
        id: String,
    },

    /// Change the status of a request you are executing (TI)
    SetStatus {
        /// Request id (UUID or "N/YYYY" number)
        id: String,

        /// New status (encaminhada, aprovada, recusada, concluida)
        status: String,
    },

    /// Approve every listed request still awaiting a decision (directorate)
    BulkApprove {
        /// Request ids (UUID or "N/YYYY" number)
        #[clap(required = true)]
        ids: Vec<String>,

        /// Refuse the whole batch if any request is no longer forwarded
        #[clap(long)]
        strict: bool,
    },

    /// Reject every listed request still awaiting a decision (directorate)
    BulkReject {
        /// Request ids (UUID or "N/YYYY" number)
        #[clap(required = true)]
        ids: Vec<String>,

        /// Refuse the whole batch if any request is no longer forwarded
        #[clap(long)]
        strict: bool,
    },

    /// Show the execution history for a request
    History {
        /// Request id (UUID or "N/YYYY" number)
        id: String,
    },
}
