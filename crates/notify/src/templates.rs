//! Plain-text and HTML bodies for each [`Notification`].

use chrono::{DateTime, Datelike, Utc};
use domain::ReservationKind;

use crate::{EmailMessage, Notification};

const TABLE_FOLLOW_UP: &str = "Please complete your payment via WhatsApp if you haven't already. \
     We'll confirm your reservation once payment is verified.";
const TICKET_FOLLOW_UP: &str =
    "Please confirm your entry via WhatsApp. Note that free tickets are subject to approval.";

/// Brand details shown in every message.
#[derive(Debug, Clone)]
pub struct Branding {
    pub name: String,
    pub app_url: String,
}

impl Default for Branding {
    fn default() -> Self {
        Self {
            name: "OffGrid".to_string(),
            app_url: "http://localhost:3000".to_string(),
        }
    }
}

fn kind_label(kind: ReservationKind) -> &'static str {
    match kind {
        ReservationKind::Table => "Paid Table",
        ReservationKind::Ticket => "Free Ticket",
    }
}

fn format_date(date: &DateTime<Utc>) -> String {
    date.format("%A, %B %-d, %Y").to_string()
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn html_page(branding: &Branding, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<body style="font-family: 'Courier New', Courier, monospace; background-color: #000000; color: #F5EDE4; margin: 0; padding: 0;">
  <div style="max-width: 600px; margin: 0 auto; padding: 40px 20px;">
    <div style="border-bottom: 1px solid #333; padding-bottom: 20px; margin-bottom: 40px;">
      <a href="{url}" style="font-size: 24px; letter-spacing: 0.2em; color: #FF5401; text-decoration: none; font-weight: bold;">{logo}</a>
    </div>
    <div style="line-height: 1.6; font-size: 16px;">
{body}
    </div>
    <div style="margin-top: 60px; font-size: 12px; color: #666; text-align: center; border-top: 1px solid #333; padding-top: 20px;">
      <p>&copy; {year} {name}. All rights reserved.</p>
    </div>
  </div>
</body>
</html>
"#,
        url = escape(&branding.app_url),
        logo = escape(&branding.name.to_uppercase()),
        name = escape(&branding.name),
        year = Utc::now().year(),
    )
}

fn detail_rows(rows: &[(&str, String)]) -> String {
    let rows: String = rows
        .iter()
        .map(|(label, value)| {
            format!(
                "<tr><td style=\"color: #888; font-size: 12px; text-transform: uppercase;\">{}</td>\
                 <td style=\"font-weight: bold;\">{}</td></tr>\n",
                escape(label),
                escape(value)
            )
        })
        .collect();
    format!(
        "<table style=\"width: 100%; background-color: #111; padding: 20px; border: 1px solid #333; margin: 30px 0;\">\n{rows}</table>"
    )
}

/// Renders a notification into an email.
pub fn render(notification: &Notification, branding: &Branding) -> EmailMessage {
    match notification {
        Notification::ReservationReceived {
            to,
            name,
            event_title,
            event_date,
            kind,
            seats,
            phone,
            ..
        } => {
            let label = kind_label(*kind);
            let follow_up = match kind {
                ReservationKind::Table => TABLE_FOLLOW_UP,
                ReservationKind::Ticket => TICKET_FOLLOW_UP,
            };
            let phone = phone.as_deref().unwrap_or("N/A");

            let mut rows = vec![
                ("Event", event_title.clone()),
                ("Date", format_date(event_date)),
                ("Type", label.to_string()),
            ];
            if *kind == ReservationKind::Table {
                rows.push(("Tables", seats.to_string()));
            }
            rows.push(("Phone", phone.to_string()));

            let details: String = rows
                .iter()
                .map(|(label, value)| format!("{label}: {value}\n"))
                .collect();
            let text = format!(
                "Hi {name},\n\n\
                 Your {label} request for {event_title} has been received.\n\n\
                 {details}\n\
                 {follow_up}\n\n\
                 If you have any questions, reply to this email or reach out on WhatsApp.\n\n\
                 {brand} Team",
                brand = branding.name,
            );

            let body = [
                format!("<p>Hi {},</p>", escape(name)),
                format!(
                    "<p>Your request for <span style=\"color: #FF5401;\">{label}</span> access has been received.</p>"
                ),
                format!("<p>{}</p>", escape(follow_up)),
                detail_rows(&rows),
                "<p>If you have any questions, simply reply to this email or reach out on WhatsApp.</p>"
                    .to_string(),
                "<p>Disconnect to Reconnect.</p>".to_string(),
            ]
            .join("\n");

            EmailMessage {
                to: to.clone(),
                subject: format!("{label} Registration - {}", branding.name),
                text,
                html: html_page(branding, &body),
            }
        }
        Notification::OrderConfirmed {
            order_id,
            to,
            name,
            lines,
            total,
        } => {
            let items: Vec<String> = lines
                .iter()
                .map(|line| {
                    format!(
                        "{} x {} @ {} = {}",
                        line.quantity,
                        line.name,
                        line.unit_price,
                        line.unit_price.multiply(line.quantity)
                    )
                })
                .collect();

            let text = format!(
                "Hi {name},\n\n\
                 Thanks for your order. Your payment has been confirmed.\n\n\
                 Order: {order_id}\n\
                 {items}\n\
                 Total: {total}\n\n\
                 {brand} Team",
                items = items.join("\n"),
                brand = branding.name,
            );

            let mut rows: Vec<(&str, String)> = vec![("Order", order_id.to_string())];
            rows.extend(items.iter().map(|item| ("Item", item.clone())));
            rows.push(("Total", total.to_string()));

            let body = [
                format!("<p>Hi {},</p>", escape(name)),
                "<p>Thanks for your order. Your payment has been confirmed.</p>".to_string(),
                detail_rows(&rows),
            ]
            .join("\n");

            EmailMessage {
                to: to.clone(),
                subject: format!("Order Confirmed - {}", branding.name),
                text,
                html: html_page(branding, &body),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use common::{MerchItemId, Money, OrderId, ReservationId};
    use domain::OrderLine;

    fn reservation(kind: ReservationKind, seats: u32, phone: Option<&str>) -> Notification {
        Notification::ReservationReceived {
            reservation_id: ReservationId::new(),
            to: "ada@example.com".to_string(),
            name: "Ada <Obi>".to_string(),
            event_title: "Rooftop Session".to_string(),
            event_date: Utc.with_ymd_and_hms(2026, 3, 14, 20, 0, 0).unwrap(),
            kind,
            seats,
            phone: phone.map(str::to_string),
        }
    }

    #[test]
    fn table_reservation_lists_tables_and_payment_follow_up() {
        let email = render(
            &reservation(ReservationKind::Table, 2, Some("+2348012345678")),
            &Branding::default(),
        );

        assert_eq!(email.to, "ada@example.com");
        assert_eq!(email.subject, "Paid Table Registration - OffGrid");
        assert!(email.text.contains("Event: Rooftop Session"));
        assert!(email.text.contains("Date: Saturday, March 14, 2026"));
        assert!(email.text.contains("Tables: 2"));
        assert!(email.text.contains("Phone: +2348012345678"));
        assert!(email.text.contains("complete your payment via WhatsApp"));
    }

    #[test]
    fn ticket_reservation_omits_tables_and_defaults_phone() {
        let email = render(
            &reservation(ReservationKind::Ticket, 1, None),
            &Branding::default(),
        );

        assert_eq!(email.subject, "Free Ticket Registration - OffGrid");
        assert!(!email.text.contains("Tables:"));
        assert!(email.text.contains("Phone: N/A"));
        assert!(email.text.contains("confirm your entry via WhatsApp"));
    }

    #[test]
    fn html_escapes_user_input() {
        let email = render(
            &reservation(ReservationKind::Ticket, 1, None),
            &Branding::default(),
        );
        assert!(email.html.contains("Ada &lt;Obi&gt;"));
        assert!(!email.html.contains("Ada <Obi>"));
    }

    #[test]
    fn order_confirmation_lists_lines_and_total() {
        let notification = Notification::OrderConfirmed {
            order_id: OrderId::new(),
            to: "ada@example.com".to_string(),
            name: "Ada".to_string(),
            lines: vec![OrderLine {
                merch_item_id: MerchItemId::new(),
                name: "Ceramic Mug".to_string(),
                unit_price: Money::from_major(25),
                quantity: 2,
            }],
            total: Money::from_major(50),
        };

        let email = render(&notification, &Branding::default());
        assert_eq!(email.subject, "Order Confirmed - OffGrid");
        assert!(email.text.contains("2 x Ceramic Mug @ 25.00 = 50.00"));
        assert!(email.text.contains("Total: 50.00"));
    }
}
