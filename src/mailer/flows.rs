//! Typed payloads for each kind of transactional email.
//!
//! Each flow knows its template, subject line, and the context keys its
//! template consumes, so callers never assemble free-form mappings.

use std::collections::BTreeMap;

use crate::repos::event_repo::Event;
use crate::repos::user_repo::User;

#[derive(Debug, Clone)]
pub enum EmailFlow {
    Welcome {
        first_name: String,
        portal_link: String,
    },
    PasswordReset {
        first_name: String,
        reset_url: String,
        expiry_hours: i64,
    },
    EventRegistration {
        first_name: String,
        event_title: String,
        event_start: String,
        event_location: String,
        event_details_url: String,
        calendar_link: String,
    },
    SurveyInvite {
        first_name: String,
        survey_title: String,
        survey_url: String,
    },
    Generic {
        subject: String,
        body: String,
    },
}

impl EmailFlow {
    pub fn welcome(user: &User, site_url: &str) -> Self {
        EmailFlow::Welcome {
            first_name: user.first_name.clone(),
            portal_link: format!("{site_url}/dashboard/"),
        }
    }

    pub fn password_reset(user: &User, site_url: &str, reset_token: &str, expiry_hours: i64) -> Self {
        EmailFlow::PasswordReset {
            first_name: user.first_name.clone(),
            reset_url: format!("{site_url}/reset-password/{reset_token}/"),
            expiry_hours,
        }
    }

    pub fn event_registration(user: &User, event: &Event, site_url: &str) -> Self {
        EmailFlow::EventRegistration {
            first_name: user.first_name.clone(),
            event_title: event.title.clone(),
            event_start: event.start_date.format("%Y-%m-%d %H:%M").to_string(),
            event_location: event.location.clone(),
            event_details_url: format!("{site_url}/events/{}/", event.id),
            calendar_link: google_calendar_link(event),
        }
    }

    pub fn survey_invite(user: &User, site_url: &str, survey_id: uuid::Uuid, survey_title: &str) -> Self {
        EmailFlow::SurveyInvite {
            first_name: user.first_name.clone(),
            survey_title: survey_title.to_string(),
            survey_url: format!("{site_url}/surveys/{survey_id}/"),
        }
    }

    pub fn template_name(&self) -> &'static str {
        match self {
            EmailFlow::Welcome { .. } => "welcome",
            EmailFlow::PasswordReset { .. } => "password_reset",
            EmailFlow::EventRegistration { .. } => "event_registration",
            EmailFlow::SurveyInvite { .. } => "survey_invite",
            EmailFlow::Generic { .. } => "generic",
        }
    }

    pub fn subject(&self) -> String {
        match self {
            EmailFlow::Welcome { .. } => "Welcome to the Member Hub!".to_string(),
            EmailFlow::PasswordReset { .. } => "Reset Your Password".to_string(),
            EmailFlow::EventRegistration { event_title, .. } => {
                format!("Registration Confirmed: {event_title}")
            }
            EmailFlow::SurveyInvite { survey_title, .. } => {
                format!("We'd love your feedback: {survey_title}")
            }
            EmailFlow::Generic { subject, .. } => subject.clone(),
        }
    }

    /// Flow payload as template context. Pure; tracking fields and the
    /// timestamp are layered on top by the dispatcher.
    pub fn context(&self) -> BTreeMap<String, String> {
        let mut ctx = BTreeMap::new();
        match self {
            EmailFlow::Welcome { first_name, portal_link } => {
                ctx.insert("first_name".to_string(), first_name.clone());
                ctx.insert("portal_link".to_string(), portal_link.clone());
            }
            EmailFlow::PasswordReset { first_name, reset_url, expiry_hours } => {
                ctx.insert("first_name".to_string(), first_name.clone());
                ctx.insert("reset_url".to_string(), reset_url.clone());
                ctx.insert("expiry_hours".to_string(), expiry_hours.to_string());
            }
            EmailFlow::EventRegistration {
                first_name,
                event_title,
                event_start,
                event_location,
                event_details_url,
                calendar_link,
            } => {
                ctx.insert("first_name".to_string(), first_name.clone());
                ctx.insert("event_title".to_string(), event_title.clone());
                ctx.insert("event_start".to_string(), event_start.clone());
                ctx.insert("event_location".to_string(), event_location.clone());
                ctx.insert("event_details_url".to_string(), event_details_url.clone());
                ctx.insert("calendar_link".to_string(), calendar_link.clone());
            }
            EmailFlow::SurveyInvite { first_name, survey_title, survey_url } => {
                ctx.insert("first_name".to_string(), first_name.clone());
                ctx.insert("survey_title".to_string(), survey_title.clone());
                ctx.insert("survey_url".to_string(), survey_url.clone());
            }
            EmailFlow::Generic { body, .. } => {
                ctx.insert("body".to_string(), body.clone());
            }
        }
        ctx
    }
}

/// "Add to calendar" deep link for registration confirmations.
fn google_calendar_link(event: &Event) -> String {
    let fmt = "%Y%m%dT%H%M%SZ";
    let start = event.start_date.format(fmt).to_string();
    let end = event
        .end_date
        .unwrap_or(event.start_date)
        .format(fmt)
        .to_string();
    format!(
        "https://calendar.google.com/calendar/render?action=TEMPLATE&text={}&dates={start}/{end}",
        urlencode(&event.title)
    )
}

fn urlencode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for b in value.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}
