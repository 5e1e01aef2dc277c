//! Plain-text replies for the chat front end.

use alerts::AlertRecord;
use chrono::{DateTime, Utc};

use crate::commands::AlertSummary;

pub const HELP: &str = "\
Commands:
  !vwap <token_address> <vwap_level>   watch a token, alert within ±10% of the level
  !list_alerts                         show every active alert
  !remove_token <token_address>        stop watching a token
  !help                                this message";

/// Registration receipt: market snapshot of the top pair and the alert band.
pub fn render_summary(summary: &AlertSummary, tolerance: f64, now: DateTime<Utc>) -> String {
    let p = &summary.top_pair;
    let r = &summary.record;

    let fdv = p
        .fdv
        .map(|v| format!("${}", group_thousands(v, 0)))
        .unwrap_or_else(|| "N/A".to_string());
    let age = p
        .age_days(now)
        .map(|d| format!("{d}d"))
        .unwrap_or_else(|| "N/A".to_string());

    let mut out = format!(
        "{pair} on {chain} @ {dex}\n\
         Contract:      {token}\n\
         USD price:     ${price}\n\
         FDV:           {fdv}\n\
         Liquidity:     ${liquidity}\n\
         Volume (24h):  ${volume_h24}\n\
         Age:           {age}\n\
         1h:            {change:+}% | ${volume_h1} | buys {buys} | sells {sells}\n\
         Alert set:     notify when price is within ±{pct:.0}% of VWAP level ${target} (requested by {who})",
        pair = p.pair.id(),
        chain = p.chain_id,
        dex = p.dex_id,
        token = r.token_id,
        price = group_thousands(p.price_usd, 5),
        liquidity = group_thousands(p.liquidity_usd, 0),
        volume_h24 = group_thousands(p.volume_h24, 2),
        change = p.price_change_h1,
        volume_h1 = group_thousands(p.volume_h1, 1),
        buys = p.buys_h1,
        sells = p.sells_h1,
        pct = tolerance * 100.0,
        target = r.target_price,
        who = r.owner.display_name,
    );

    if !p.url.is_empty() {
        out.push_str("\nChart:         ");
        out.push_str(&p.url);
    }
    out
}

pub fn render_alert_list(alerts: &[AlertRecord]) -> String {
    if alerts.is_empty() {
        return "No alerts are currently set.".to_string();
    }

    let mut out = String::from("Current alerts:");
    for a in alerts {
        let last = a
            .last_alert_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "never".to_string());
        out.push_str(&format!(
            "\n- {} {} (VWAP: ${}, last price: ${}, last alert: {})",
            a.ticker,
            a.token_id,
            a.target_price,
            format_price(a.last_known_price),
            last
        ));
    }
    out
}

/// Price with enough precision to be useful for sub-cent tokens.
pub fn format_price(price: f64) -> String {
    if price.abs() >= 1.0 {
        group_thousands(price, 2)
    } else {
        format!("{price:.8}")
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    }
}

/// `1234567.891` with 2 decimals → `1,234,567.89`.
pub fn group_thousands(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (formatted.as_str(), None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && formatted.chars().any(|c| c.is_ascii_digit() && c != '0') {
        "-"
    } else {
        ""
    };

    match frac_part {
        Some(f) => format!("{sign}{grouped}.{f}"),
        None => format!("{sign}{grouped}"),
    }
}
