use clap::{ArgAction, Parser};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "medhistory",
    version,
    about = "patient medical history client",
    long_about = "medhistory loads a patient's medication, surgical, social and vaccination history from the clinic backend, renders the paginated lists and edits single records.\n\nExamples:\n  medhistory -p 42\n  medhistory -p 42 -e surgical -n 2\n  medhistory -p 42 -e medication --edit 7 -s dosage=20mg\n  medhistory -p 42 -e social --add -s diet=vegan\n  medhistory -p 42 -o history.html\n\nTip: Use --token once to store the auth token and --init-config to write a starter config."
)]
pub struct CliArgs {
    #[arg(
        short = 'v',
        long = "vb",
        visible_alias = "verbose",
        action = ArgAction::Count,
        help_heading = "Output",
        help = "Increase log verbosity (-v, -vv)."
    )]
    pub verbose: u8,

    #[arg(
        short = 'c',
        long = "clr",
        visible_alias = "color",
        help_heading = "Output",
        help = "Enable colored output (overrides --no-color)."
    )]
    pub color: bool,

    #[arg(
        long = "nc",
        visible_alias = "no-color",
        help_heading = "Output",
        help = "Disable colored output."
    )]
    pub no_color: bool,

    #[arg(
        short = 'o',
        long = "out",
        visible_alias = "output",
        value_name = "FILE",
        help_heading = "Output",
        help = "Write the rendered lists to a file."
    )]
    pub output: Option<String>,

    #[arg(
        short = 'A',
        long = "of",
        visible_alias = "output-format",
        value_name = "FORMAT",
        help_heading = "Output",
        help = "Output format (text, json, html)."
    )]
    pub output_format: Option<String>,

    #[arg(
        short = 'p',
        long = "pid",
        visible_alias = "patient",
        value_name = "ID",
        help_heading = "Patient",
        help = "Patient id (sets the id query parameter of the page URL)."
    )]
    pub patient: Option<String>,

    #[arg(
        short = 'U',
        long = "pu",
        visible_alias = "page-url",
        value_name = "URL",
        help_heading = "Patient",
        help = "Full page URL carrying ?id= (and optionally &edit_id=)."
    )]
    pub page_url: Option<String>,

    #[arg(
        short = 'e',
        long = "ent",
        visible_alias = "entity",
        value_name = "LIST",
        action = ArgAction::Append,
        help_heading = "Lists",
        help = "History lists to load (comma-separated or repeatable: medication, surgical, social, vaccination)."
    )]
    pub entity: Vec<String>,

    #[arg(
        short = 'n',
        long = "pg",
        visible_alias = "page",
        value_name = "N",
        help_heading = "Lists",
        help = "Page to show after the first page has loaded."
    )]
    pub page: Option<String>,

    #[arg(
        long = "ed",
        visible_alias = "edit",
        value_name = "RECORD_ID",
        help_heading = "Edit",
        help = "Open a record in the edit form (requires exactly one editable list)."
    )]
    pub edit: Option<String>,

    #[arg(
        long = "add",
        help_heading = "Edit",
        help = "Open the add form and create a record from the --set values (requires exactly one editable list)."
    )]
    pub add: bool,

    #[arg(
        short = 's',
        long = "set",
        value_name = "FIELD=VALUE",
        action = ArgAction::Append,
        help_heading = "Edit",
        help = "Change a form field and submit the edit or new record (repeatable)."
    )]
    pub set: Vec<String>,

    #[arg(
        short = 'E',
        long = "ep",
        visible_alias = "endpoint",
        value_name = "URL",
        help_heading = "HTTP",
        help = "Backend endpoint (overrides MEDHISTORY_ENDPOINT and the config file)."
    )]
    pub endpoint: Option<String>,

    #[arg(
        short = 'T',
        long = "to",
        visible_alias = "timeout",
        value_name = "SECONDS",
        help_heading = "HTTP",
        help = "Per-request timeout in seconds."
    )]
    pub timeout: Option<u64>,

    #[arg(
        short = 'x',
        long = "px",
        visible_alias = "proxy",
        value_name = "URL",
        help_heading = "HTTP",
        help = "HTTP proxy URL (e.g. http://127.0.0.1:8080)."
    )]
    pub proxy: Option<String>,

    #[arg(
        long = "tk",
        visible_alias = "token",
        value_name = "TOKEN",
        help_heading = "Auth",
        help = "Store an auth token in persistent storage before running."
    )]
    pub token: Option<String>,

    #[arg(
        long = "st",
        visible_alias = "storage",
        value_name = "FILE",
        help_heading = "Auth",
        help = "Path to the persistent storage file (defaults to ~/.medhistory/storage.json)."
    )]
    pub storage: Option<String>,

    #[arg(
        short = 'C',
        long = "cfg",
        visible_alias = "config",
        value_name = "FILE",
        help_heading = "Config",
        help = "Path to config file (defaults to ~/.medhistory/config.yml)."
    )]
    pub config: Option<String>,

    #[arg(
        long = "ic",
        visible_alias = "init-config",
        help_heading = "Config",
        help = "Write a default config file if none exists and exit."
    )]
    pub init_config: bool,
}
