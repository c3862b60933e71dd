//! Fixed dialog text: menu entries, categories and the assistant's lines.

use rand::seq::IndexedRandom as _;

/// Affirmative review answer.
pub const YES: &str = "Yes";
/// Negative review answer.
pub const NO: &str = "No";

/// Menu entry for the expense flow.
pub const LOG_EXPENSE: &str = "Log Expense";
/// Menu entry for the monthly spend summary.
pub const SPEND_MONTH: &str = "Show Spend for the Month";
/// Menu entry for the recent transaction listing.
pub const LAST_TXNS: &str = "Show Last Transactions";
/// Menu entry for the gift flow.
pub const LOG_GIFT: &str = "Log Gift";
/// Menu entry for the monthly gift total.
pub const GIFT_SPEND: &str = "Show Gift Spend for the Month";

/// Menu entries in display order.
pub const TASKS: [&str; 5] = [LOG_EXPENSE, SPEND_MONTH, LAST_TXNS, LOG_GIFT, GIFT_SPEND];

/// Menu entry that ends the conversation.
pub const EXIT_STR: &str = "Nah G, is cool. Carry on";

/// Pseudo-category meaning every category in the transaction listing.
pub const ALL: &str = "ALL";

/// Expense categories, recurring first.
pub const EXPENSE_CATEGORIES: [&str; 8] = [
    "Quick Meal",
    "Dining & Ent",
    "Groceries & HH",
    "Transportation",
    "Shopping",
    "Rent",
    "Utilities",
    "Other",
];

/// Choices for the transaction listing: every category, then each one.
pub const TXN_CATEGORIES: [&str; 9] = [
    ALL,
    "Quick Meal",
    "Dining & Ent",
    "Groceries & HH",
    "Transportation",
    "Shopping",
    "Rent",
    "Utilities",
    "Other",
];

/// Remarks for a transaction above its category's cap.
pub const LINES_SHAME: [&str; 6] = [
    "Well, someone got a bit carried away.",
    "I hope you have a good explanation for this.",
    "Look at Master Moneybags over here.",
    "Quite a prudent expenditure, might I say.",
    "What an excellent use of financial resources.",
    "There goes junior's college fund.",
];

/// Openers for the gift flow.
pub const LINES_ENTHUSIASM: [&str; 3] = [
    "Ooooooh, goodie!",
    "What sparks of joy!",
    "Well, isn't that nice.",
];

pub(crate) const MENU: &str = "My Services:\nNote: You can type \"/cancel\" to stop at any time.";
pub(crate) const CONFUSED: &str =
    "I didn't quite catch your mumbling. Here's what I can do for you.";
pub(crate) const LAND: &str = "Anything else I can do for you?";
pub(crate) const APOLOGY_FOLLOW_UP: &str = "Anything else I can do you for?";
pub(crate) const ACCESS_DENIED: &str =
    "You do not have access to this bot. :(\nThank you and have a nice day! :)";

pub(crate) const ASK_EXPENSE_CATEGORY: &str = "What did you spend on now?";
pub(crate) const ASK_TXN_CATEGORY: &str = "May I ask for which category?";
pub(crate) const ASK_EXPENSE_AMOUNT: &str = "How much did you spend?";
pub(crate) const ASK_EXPENSE_NOTES: &str =
    "Do you have anything else to say for yourself?\n(Enter \"no comment\" otherwise)";
pub(crate) const EXPENSE_UPLOADED: &str =
    "Very well. I will submit the data for upload. Have a good day.";
pub(crate) const EXPENSE_RETRY: &str =
    "Well of course there's something wrong... Let's try again shall we?";

pub(crate) const ASK_GIFT_RECIPIENT: &str = "Might I ask to whom this gift is for?";
pub(crate) const ASK_GIFT_ITEM: &str = "Aw... and what did you get?";
pub(crate) const ASK_GIFT_AMOUNT: &str = "And for how much?";
pub(crate) const ASK_GIFT_NOTE: &str =
    "Do you wish to add any comments?\n(Enter \"no comment\" otherwise)";
pub(crate) const GIFT_UPLOADED: &str =
    "Alright. I shall add them to my records. Have a pleasant day.";
pub(crate) const GIFT_RETRY: &str = "Let's try again shall we?";

pub(crate) fn greeting(name: &str, vacation: bool) -> String {
    if vacation {
        format!("Hello Master {name}! Hope you're having fun!")
    } else {
        format!("Hello Master {name}, what now?\n\n*shrug*")
    }
}

pub(crate) fn farewell(name: &str) -> String {
    format!("Glad to be of service, Master {name}.")
}

pub(crate) fn apology(dev_name: &str) -> String {
    format!("Terribly sorry... I seem to be having problems...\n\nBlame {dev_name}...")
}

pub(crate) fn not_an_answer(text: &str) -> String {
    format!("Does \"{text}\" seem to answer my question?\nLet me ask again...")
}

/// Render the review prompt for `(label, value)` pairs in entry order.
pub(crate) fn review(fields: &[(&str, String)]) -> String {
    let body = fields
        .iter()
        .map(|(key, val)| format!("    {key}: {val}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!("Is the data below correct?:\n\n{body}")
}

/// Pick one line at random.
pub(crate) fn pick(lines: &[&'static str]) -> &'static str {
    lines.choose(&mut rand::rng()).copied().unwrap_or_default()
}
