//! Canned replies and the static command, action and keyword tables.

use std::sync::Arc;

use crate::formatting::escape_html;
use crate::router::{Control, KeywordTable, ResponsePayload};

pub const START_TEXT: &str = "HI from Ecohavest";
pub const FETCHING_TEXT: &str = "Fetching latest crypto prices and news, please wait...";
pub const UNABLE_TO_VERIFY: &str = "Unable to verify user.";
pub const NOT_AUTHORIZED: &str = "You are not authorized to use this command.";
pub const PERMISSION_ERROR: &str = "An error occurred while checking permissions.";
pub const BAN_USAGE: &str = "Reply to a message from the user you want to ban with /ban.";
pub const BAN_DONE: &str = "User has been banned.";
pub const BAN_FAILED: &str = "Failed to ban user.";
pub const SHUTDOWN_TEXT: &str = "Shutting down...";

pub const FAQ_TEXT: &str = r#"<b>Frequently Asked Questions:</b>

<b>1. How can I make deals with Ecoharvest?</b>
   - To make a deal, you must first become a registered customer. Once you are signed up, you can make your first deposit. Alternatively, reach out to our customer service at <a href="mailto:support@ecohavest.org">support@ecohavest.org</a>.

<b>2. How can I apply for KYC Verification?</b>
   - Once verified, you'll access all Ecoharvest services. Verify your identity by uploading clear color copies (photo or scan) of:
     • <b>Proof of identity:</b> Passport, national ID card, or driving license (if it includes your address, additional proof might not be needed).
     • <b>Proof of address:</b> Bank/card statement or utility bill (e.g., water, gas, electric, internet, phone), residency certificate, or tenancy contract.

<b>3. Are there any withdrawal limits?</b>
   - You can request cryptocurrency withdrawals equivalent to at least 50 USD.

<b>4. How long does it take for my deposit to be added?</b>
   - Deposits are processed immediately.

<b>5. How does Ecoharvest thrive?</b>
   - Ecoharvest provides Solar Energy Solutions using automated elements, cryptocurrency trading, AI-based asset management, Blockchain technologies, and protocols for fast order delivery."#;

const KYC_TEXT: &str = "<b>KYC Verification Guide</b>

1️⃣ Upload a clear photo of your ID (passport, driver's license)
2️⃣ Provide proof of address (utility bill, bank statement)
3️⃣ Allow up to 24 hours for review.";

const SIGNUP_TEXT: &str = "<b>How to Sign Up</b>

• Go to the <a href=\"https://ecohavest.org/signup\">Signup Page</a>
• Fill in your details and verify your email
• Start trading instantly!";

const PROBLEM_TEXT: &str = "<b>Experiencing an Issue?</b>

We're sorry to hear you're facing a problem. Please describe the issue you're encountering in detail.

Alternatively, you can contact our support team directly via email for assistance.";

const INTRO_TEXT: &str = "Here's a quick intro to get started:

• Read the <a href=\"https://ecohavest.org/about\">About Us</a>
• Drop a hello in #introductions
• Use /help for commands
• Use /faq for frequently asked questions";

const START_INTRO_TEXT: &str = "Great! Please tell us a bit about yourself.<i> For example:</i>
\"I'm Alex, I love automation and chess!\"";

const KYC_HELP_TEXT: &str = "<b>Need help with KYC?</b>

If you're having trouble with the KYC process, please:
• Ensure your documents are clear and valid.
• Check the <a href=\"https://ecohavest.org/faq\">FAQ page</a> for common issues.
• Contact support at <a href=\"mailto:support@ecohavest.org\">support@ecohavest.org</a> for direct assistance.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Start,
    Help,
    Faq,
    CryptoUpdates,
    Ban,
    Shutdown,
}

#[derive(Debug, Clone, Copy)]
pub struct CommandSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub admin_only: bool,
    /// Shown in `/help` and the Telegram command menu.
    pub listed: bool,
    pub kind: CommandKind,
}

/// Every command the bot answers, in the order `/help` lists them.
/// `/start` works but stays out of the menu.
pub const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "start",
        description: "Say hello",
        admin_only: false,
        listed: false,
        kind: CommandKind::Start,
    },
    CommandSpec {
        name: "help",
        description: "Show this help message",
        admin_only: false,
        listed: true,
        kind: CommandKind::Help,
    },
    CommandSpec {
        name: "faq",
        description: "Frequently Asked Questions",
        admin_only: false,
        listed: true,
        kind: CommandKind::Faq,
    },
    CommandSpec {
        name: "crypto_updates",
        description: "Get latest crypto prices & news",
        admin_only: false,
        listed: true,
        kind: CommandKind::CryptoUpdates,
    },
    CommandSpec {
        name: "ban",
        description: "Ban a user (admin only)",
        admin_only: true,
        listed: true,
        kind: CommandKind::Ban,
    },
    CommandSpec {
        name: "shutdown",
        description: "Shutdown the bot (admin only)",
        admin_only: true,
        listed: true,
        kind: CommandKind::Shutdown,
    },
];

pub fn find_command(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|c| c.name == name)
}

/// Commands advertised to users.
pub fn listed_commands() -> impl Iterator<Item = &'static CommandSpec> {
    COMMANDS.iter().filter(|c| c.listed)
}

pub fn help_text() -> String {
    let mut text = String::from("Available commands:\n");
    for cmd in listed_commands() {
        text.push_str(&format!("/{} - {}\n", cmd.name, escape_html(cmd.description)));
    }
    text
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    StartIntro,
    KycHelp,
}

/// Callback data → action.
pub const ACTIONS: &[(&str, ActionKind)] = &[
    ("start_intro", ActionKind::StartIntro),
    ("kyc_help", ActionKind::KycHelp),
];

pub fn find_action(id: &str) -> Option<ActionKind> {
    ACTIONS
        .iter()
        .find(|(action_id, _)| *action_id == id)
        .map(|(_, kind)| *kind)
}

/// Toast shown on the pressed button, then the reply sent to the chat.
pub fn action_response(kind: ActionKind) -> (Option<&'static str>, ResponsePayload) {
    match kind {
        ActionKind::StartIntro => (None, ResponsePayload::text(START_INTRO_TEXT)),
        ActionKind::KycHelp => (
            Some("Providing KYC help..."),
            ResponsePayload::text(KYC_HELP_TEXT),
        ),
    }
}

pub fn welcome(first_name: &str) -> ResponsePayload {
    ResponsePayload::text(format!("👋 Welcome, <b>{}</b>!", escape_html(first_name)))
}

pub fn intro() -> ResponsePayload {
    ResponsePayload::text(INTRO_TEXT).with_controls(vec![
        vec![Control::url("📜 About Us", "https://ecohavest.org/about")],
        vec![Control::callback("💬 Introduce Me", "start_intro")],
    ])
}

/// Keyword responder table. Order matters: the first contained keyword wins.
pub fn keyword_table() -> KeywordTable {
    let kyc = Arc::new(ResponsePayload::text(KYC_TEXT).with_controls(vec![
        vec![Control::url(
            "📄 KYC Docs",
            "https://ecohavest.org/dashboard/account/kyc",
        )],
        vec![Control::callback("❓ Need Help?", "kyc_help")],
    ]));
    let signup = Arc::new(ResponsePayload::text(SIGNUP_TEXT));
    let problem = Arc::new(ResponsePayload::text(PROBLEM_TEXT).with_controls(vec![vec![
        Control::url("📧 Contact Us", "https://ecohavest.org/contact"),
    ]]));

    KeywordTable::builder()
        .keyword("kyc", &kyc)
        .keyword("signup", &signup)
        .aliases(&["problem", "issue", "issues", "trouble", "other"], &problem)
        .build()
}
