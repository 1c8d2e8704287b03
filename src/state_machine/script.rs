//! Canned bot lines and option sets for the study-abroad intake flow

use super::state::ContactInfo;

pub const STUDY_LEVELS: &[&str] = &[
    "Bachelor's",
    "Master's",
    "PhD",
    "Diploma or Certification",
    OTHER,
];

pub const COUNTRIES: &[&str] = &[
    "USA",
    "UK",
    "Canada",
    "Australia",
    "Germany",
    "France",
    "New Zealand",
    "Singapore",
    "Ireland",
    OTHER,
];

pub const LANGUAGE_SCORES: &[&str] = &[
    "IELTS 6.0-6.5",
    "IELTS 7.0-7.5",
    "IELTS 8.0+",
    "TOEFL 80-90",
    "TOEFL 90-100",
    "TOEFL 100+",
    "PTE 50-60",
    "PTE 60-70",
    "PTE 70+",
    "Not taken yet",
    OTHER,
];

pub const START_TIMEFRAMES: &[&str] = &[
    "Next 3 months",
    "3-6 months",
    "6-12 months",
    "Next year",
    "Not decided yet",
];

pub const YES: &str = "Yes";
pub const NO: &str = "No";
pub const DESTINATION_ANSWERS: &[&str] = &[YES, NO];

pub const BOOK_NOW: &str = "Yes, Book Now";
pub const NO_THANKS: &str = "No, thanks";
pub const BOOKING_ANSWERS: &[&str] = &[BOOK_NOW, NO_THANKS];

/// Choice that hands the current question over to free-text entry
pub const OTHER: &str = "Other";

/// Greetings accepted before the flow starts (compared case-insensitively)
pub const GREETINGS: &[&str] = &["hi", "hello"];

pub const DEFAULT_GREETING_PROMPT: &str = "Great to meet you! What's your full name?";
pub const SAY_HI: &str = "Please say \"Hi\" to start the conversation 😊";
pub const NOT_UNDERSTOOD: &str = "I didn't understand that. Please follow the prompts.";

pub const ASK_STUDY_LEVEL: &str = "Awesome! What level of study are you planning for?";
pub const ASK_DESTINATION: &str = "Do you have a specific country in mind for your studies?";
pub const ASK_COUNTRY: &str = "Which country are you aiming for?";
pub const SUGGEST_DESTINATIONS: &str = "No problem! Some top destinations are USA, UK, Canada, \
     Australia, and Germany. You can explore more on our country pages.";
pub const ASK_SUBJECT: &str = "What subject or field are you interested in?";
pub const ASK_LANGUAGE_SCORE: &str =
    "Have you taken any language proficiency tests (IELTS/TOEFL/PTE)?";
pub const ASK_START_DATE: &str =
    "Perfect! One last question — when are you planning to start your studies abroad?";
pub const THANK_YOU: &str = "Thank you for sharing your details! Our education experts will \
     review your preferences and get in touch shortly. You're one step closer to studying abroad!";
pub const OFFER_BOOKING: &str = "Would you like to book a free consultation with our expert?";
pub const BOOKING_CONFIRMED: &str = "Great! Please visit our contact page to schedule your free \
     consultation. Our experts will help you plan your study abroad journey.";
pub const BOOKING_DECLINED: &str = "No problem! Feel free to browse our website for more \
     information about studying abroad. We're here to help whenever you're ready.";

pub fn ask_location(name: &str) -> String {
    format!("Thanks, {name}! Where are you from?")
}

pub fn reach_us_directly(contact: &ContactInfo) -> String {
    format!(
        "You can also reach us directly: email {} · phone {} · WhatsApp https://wa.me/{} · {}",
        contact.email, contact.phone, contact.whatsapp_number, contact.page_url
    )
}

pub fn submission_failed(contact: &ContactInfo) -> String {
    format!(
        "Sorry, we couldn't send your details to our team just now. Please reach us at {} \
         and we'll get back to you.",
        contact.email
    )
}

pub fn is_greeting(input: &str) -> bool {
    let normalized = input.trim().to_lowercase();
    GREETINGS.iter().any(|g| *g == normalized)
}

pub fn owned(options: &[&str]) -> Vec<String> {
    options.iter().map(ToString::to_string).collect()
}
