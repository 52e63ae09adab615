//! Fixed values shared by the parser, partitioner, validator and script analyzer.

/// Node numbers at or above this value belong to the runtime (error handlers,
/// fallbacks) and are never owned by a flow.
pub const SYSTEM_NODE_THRESHOLD: i64 = 99990;

/// The runtime's generic error handler. Used as the default auto-fix target.
pub const DEFAULT_FALLBACK_NODE: i64 = 99990;

/// Flows are allocated in contiguous blocks of this many node numbers.
pub const FLOW_BLOCK_SIZE: i64 = 100;

/// Separator between entries in next-node lists and what-next tables.
pub const LIST_SEPARATOR: char = '|';

/// Separator between a what-next label and its target node.
pub const ROUTE_SEPARATOR: char = '~';

/// Label of the route every Action node must declare for script failures.
pub const ERROR_ROUTE_LABEL: &str = "error";

/// The neutral command custom scripts are replaced with on removal.
pub const NOOP_COMMAND: &str = "MockAction";

/// Commands provided by the runtime. Anything else on an Action node is a
/// custom script that has to be uploaded with the artifact.
pub const SYSTEM_COMMANDS: &[&str] = &[
    "MockAction",
    "SetVar",
    "SetFormID",
    "GetValue",
    "ValidateEmail",
    "ValidatePhone",
    "ValidateDate",
    "ValidateRegex",
    "ValidateZip",
    "SendEmail",
    "SendSMS",
    "HandleBotError",
    "PostEventToBot",
    "ChatToLiveAgent",
    "BotToPlatform",
    "UserPlatformRouting",
    "EventsToGoogleAnalytics",
    "GenerateTranscript",
];

/// Tags (in `node_tags` or `behaviors`) that mark a Decision node as an
/// intentional end of conversation.
pub const ENDPOINT_TAGS: &[&str] = &["end", "endpoint", "terminal", "xfer_to_agent"];

/// Rich-content option labels longer than this are shortened on graph edges.
pub const EDGE_LABEL_DISPLAY_LEN: usize = 24;
