use chrono::{DateTime, FixedOffset};
use serde_json::{Value, json};

use crate::model::{AlertRecord, AlertSignal, RsiZone, SignalRecord, Trend};
use crate::notifier::Message;
use crate::pipeline::RecordSet;

pub const ALT_TEXT: &str = "OverTrade Signal";

const UP_COLOR: &str = "#1DB446";
const DOWN_COLOR: &str = "#f5314b";

/// Builds LINE flex bubbles and carousels from signal and alert records.
#[derive(Debug, Clone, Default)]
pub struct CardRenderer {
    icon_up: Option<String>,
    icon_down: Option<String>,
}

impl CardRenderer {
    pub fn new(icon_up: Option<String>, icon_down: Option<String>) -> Self {
        Self { icon_up, icon_down }
    }

    /// One carousel message per chunk of signal records.
    pub fn signal_messages(
        &self,
        chunks: &[RecordSet<SignalRecord>],
        now: DateTime<FixedOffset>,
    ) -> Vec<Message> {
        chunks
            .iter()
            .map(|chunk| carousel(chunk.values().map(|r| self.signal_card(r, now)).collect()))
            .collect()
    }

    /// One carousel message per chunk of alert records.
    pub fn alert_messages(&self, chunks: &[RecordSet<AlertRecord>]) -> Vec<Message> {
        chunks
            .iter()
            .map(|chunk| carousel(chunk.values().map(|r| self.alert_card(r)).collect()))
            .collect()
    }

    pub fn signal_card(&self, record: &SignalRecord, now: DateTime<FixedOffset>) -> Value {
        let trend_color = if record.trend == Trend::Up {
            UP_COLOR
        } else {
            DOWN_COLOR
        };
        let bar_color = match record.zone {
            RsiZone::Overbought => "#2edb02",
            RsiZone::Oversold => "#ff2424",
        };
        let pivot = &record.pivot;
        let stamp = now.format("%Y.%m.%d %H.%M").to_string();

        json!({
            "type": "bubble",
            "body": {
                "type": "box",
                "layout": "vertical",
                "contents": [
                    {
                        "type": "text",
                        "text": record.trend.to_string(),
                        "weight": "bold",
                        "color": trend_color,
                        "size": "sm"
                    },
                    {
                        "type": "text",
                        "text": record.pair,
                        "weight": "bold",
                        "size": "xxl",
                        "margin": "md"
                    },
                    {
                        "type": "text",
                        "text": record.description,
                        "size": "xs",
                        "color": "#aaaaaa",
                        "wrap": true
                    },
                    {
                        "type": "text",
                        "text": format!("Timeframe: {} - {}%", record.timeframe, record.rsi_value),
                        "color": "#000000",
                        "align": "start",
                        "size": "xs",
                        "gravity": "center",
                        "margin": "lg"
                    },
                    {
                        "type": "box",
                        "layout": "vertical",
                        "contents": [
                            {
                                "type": "box",
                                "layout": "vertical",
                                "contents": [{ "type": "filler" }],
                                "width": format!("{}%", record.rsi_value),
                                "backgroundColor": bar_color,
                                "height": "6px"
                            }
                        ],
                        "backgroundColor": "#f0f0f2",
                        "height": "6px",
                        "margin": "sm"
                    },
                    { "type": "separator", "margin": "xxl" },
                    {
                        "type": "box",
                        "layout": "vertical",
                        "margin": "xxl",
                        "spacing": "sm",
                        "contents": [
                            row("Pivots", "Fibonacci", true),
                            { "type": "separator", "color": "#FFFFFF", "margin": "sm" },
                            row("Resistance #3", &pivot.r3, false),
                            row("Resistance #2", &pivot.r2, false),
                            row("Resistance #1", &pivot.r1, false),
                            row("Support #1", &pivot.s1, false),
                            row("Support #2", &pivot.s2, false),
                            row("Support #3", &pivot.s3, false)
                        ]
                    },
                    { "type": "separator", "margin": "xxl" },
                    {
                        "type": "box",
                        "layout": "horizontal",
                        "margin": "md",
                        "contents": [
                            {
                                "type": "text",
                                "text": "TIMESTAMP",
                                "size": "xs",
                                "color": "#aaaaaa",
                                "flex": 0
                            },
                            {
                                "type": "text",
                                "text": format!("#{stamp}"),
                                "color": "#aaaaaa",
                                "size": "xs",
                                "align": "end"
                            }
                        ]
                    }
                ]
            },
            "styles": { "footer": { "separator": true } }
        })
    }

    pub fn alert_card(&self, record: &AlertRecord) -> Value {
        let buy = record.signal == AlertSignal::UpArrow;
        let header_color = if buy { "#0367D3" } else { "#d61e34" };
        let icon = if buy { &self.icon_up } else { &self.icon_down };
        let marker = match icon {
            Some(url) => json!({ "type": "image", "url": url, "size": "xxs", "margin": "md" }),
            None => json!({
                "type": "text",
                "text": record.signal.to_string(),
                "color": "#ffffff",
                "size": "xl",
                "align": "end"
            }),
        };

        json!({
            "type": "bubble",
            "size": "mega",
            "header": {
                "type": "box",
                "layout": "horizontal",
                "contents": [
                    {
                        "type": "box",
                        "layout": "vertical",
                        "contents": [
                            {
                                "type": "text",
                                "text": record.pair,
                                "color": "#ffffff",
                                "size": "xl",
                                "flex": 4,
                                "weight": "bold"
                            },
                            {
                                "type": "text",
                                "text": record.description,
                                "color": "#ffffff66",
                                "size": "sm"
                            }
                        ],
                        "margin": "sm",
                        "flex": 3
                    },
                    {
                        "type": "box",
                        "layout": "vertical",
                        "contents": [marker],
                        "alignItems": "flex-end"
                    }
                ],
                "paddingAll": "20px",
                "backgroundColor": header_color,
                "spacing": "xs",
                "height": "100px",
                "paddingTop": "22px"
            }
        })
    }
}

fn row(label: &str, value: &str, bold: bool) -> Value {
    let mut label_text = json!({
        "type": "text",
        "text": label,
        "size": "sm",
        "color": "#555555",
        "flex": 0
    });
    let mut value_text = json!({
        "type": "text",
        "text": value,
        "size": "sm",
        "color": "#111111",
        "align": "end"
    });
    if bold {
        label_text["weight"] = json!("bold");
        value_text["weight"] = json!("bold");
    }
    json!({ "type": "box", "layout": "horizontal", "contents": [label_text, value_text] })
}

/// Wrap bubbles into a single flex carousel message.
pub fn carousel(bubbles: Vec<Value>) -> Message {
    Message::Flex {
        alt_text: ALT_TEXT.into(),
        contents: json!({ "type": "carousel", "contents": bubbles }),
    }
}
