//! Report row cap and truncation against a real database.

use fieldlog::ReportAggregator;
use fieldlog_db::{DeviceMessage, FieldlogDb, MessageClass};
use std::sync::Arc;
use tempfile::TempDir;

fn messages(guid: &str, n: usize) -> Vec<DeviceMessage> {
    (1..=n)
        .map(|i| DeviceMessage {
            number: i as i64,
            mqtt: "mqtt".to_string(),
            invid: "G-044322".to_string(),
            unit_guid: guid.to_string(),
            message_id: format!("msg{}", i),
            message_text: format!("event {}", i),
            context: String::new(),
            message_class: MessageClass::Event,
            level: 10,
            area: "LOCAL".to_string(),
            address: format!("a{}", i),
        })
        .collect()
}

#[tokio::test]
async fn forty_five_messages_list_thirty_and_count_the_rest() {
    let temp = TempDir::new().unwrap();
    let db = FieldlogDb::open(temp.path().join("fieldlog.sqlite3"))
        .await
        .unwrap();
    db.save_messages(&messages("dev-a", 45)).await.unwrap();

    let aggregator = ReportAggregator::new(Arc::new(db), temp.path().join("reports"));
    let path = aggregator.regenerate("dev-a").await.unwrap();
    let text = std::fs::read_to_string(path).unwrap();

    assert!(text.contains("Unit GUID:      dev-a"));
    assert!(text.contains("Inventory id:   G-044322"));
    assert!(text.contains("Total messages: 45"));
    assert!(text.contains("+ 15 more messages"));

    let listed = text.lines().filter(|l| l.contains("| event ")).count();
    assert_eq!(listed, 30);
}

#[tokio::test]
async fn exactly_thirty_has_no_marker() {
    let temp = TempDir::new().unwrap();
    let db = FieldlogDb::open_in_memory().await.unwrap();
    db.save_messages(&messages("dev-b", 30)).await.unwrap();

    let aggregator = ReportAggregator::new(Arc::new(db), temp.path());
    let text = std::fs::read_to_string(aggregator.regenerate("dev-b").await.unwrap()).unwrap();

    assert!(text.contains("Total messages: 30"));
    assert!(!text.contains("more messages"));
}

#[tokio::test]
async fn long_text_and_address_are_cut() {
    let temp = TempDir::new().unwrap();
    let db = FieldlogDb::open_in_memory().await.unwrap();
    let mut msg = messages("dev-c", 1).remove(0);
    msg.message_text = "Compressor 3 discharge pressure above limit".to_string();
    msg.address = "plant1.cold78_status.Temp_Al_HH".to_string();
    db.save_messages(&[msg]).await.unwrap();

    let aggregator = ReportAggregator::new(Arc::new(db), temp.path());
    let text = std::fs::read_to_string(aggregator.regenerate("dev-c").await.unwrap()).unwrap();

    assert!(text.contains("Compressor 3 discharge pres..."));
    assert!(!text.contains("pressure above"));
    assert!(text.contains("plant1.cold78_status.T..."));
    assert!(!text.contains("Temp_Al_HH"));
}
