use anyhow::{bail, Context, Result};
use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::process::table::Record;

/// A parsed XML response: every `<item>` element plus the envelope result code.
#[derive(Debug, Default)]
pub struct XmlPayload {
    pub result_code: Option<String>,
    pub result_msg: Option<String>,
    pub items: Vec<Record>,
}

impl XmlPayload {
    /// Fail if the envelope reported a non-success code. A missing code is success,
    /// as is any all-zero code (`"00"`, `"0000"`).
    pub fn ensure_success(&self) -> Result<()> {
        match &self.result_code {
            Some(code) if !code.chars().all(|c| c == '0') => bail!(
                "API error {}: {}",
                code,
                self.result_msg.as_deref().unwrap_or("no message")
            ),
            _ => Ok(()),
        }
    }
}

/// Collect each `item_tag` element as a record of its child tag/text pairs.
///
/// Text of grandchildren is folded into the child it sits under. Self-closing
/// children become empty values.
pub fn parse_items(xml: &str, item_tag: &str) -> Result<XmlPayload> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut payload = XmlPayload::default();
    let mut current: Option<Record> = None;
    // (child tag, accumulated text, depth below the child)
    let mut child: Option<(String, String, usize)> = None;
    let mut envelope_tag: Option<String> = None;

    loop {
        let event = reader
            .read_event()
            .with_context(|| format!("XML parse error at byte {}", reader.buffer_position()))?;
        match event {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if let Some((_, _, depth)) = child.as_mut() {
                    *depth += 1;
                } else if current.is_some() {
                    child = Some((name, String::new(), 0));
                } else if name == item_tag {
                    current = Some(Vec::new());
                } else {
                    envelope_tag = Some(name);
                }
            }
            Event::Empty(e) => {
                if child.is_none() {
                    if let Some(record) = current.as_mut() {
                        let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                        record.push((name, String::new()));
                    }
                }
            }
            Event::Text(e) => {
                let text = e.unescape().context("unescaping XML text")?;
                if let Some((_, buf, _)) = child.as_mut() {
                    buf.push_str(&text);
                } else if current.is_none() {
                    match envelope_tag.as_deref() {
                        Some("resultCode") => payload.result_code = Some(text.trim().to_string()),
                        Some("resultMsg") => payload.result_msg = Some(text.trim().to_string()),
                        _ => {}
                    }
                }
            }
            Event::CData(e) => {
                if let Some((_, buf, _)) = child.as_mut() {
                    buf.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Event::End(e) => {
                if let Some((name, buf, depth)) = child.as_mut() {
                    if *depth > 0 {
                        *depth -= 1;
                    } else {
                        let value = buf.trim().to_string();
                        let name = std::mem::take(name);
                        if let Some(record) = current.as_mut() {
                            record.push((name, value));
                        }
                        child = None;
                    }
                } else if e.name().as_ref() == item_tag.as_bytes() {
                    if let Some(record) = current.take() {
                        payload.items.push(record);
                    }
                } else {
                    envelope_tag = None;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<response>
  <header>
    <resultCode>00</resultCode>
    <resultMsg>NORMAL SERVICE.</resultMsg>
  </header>
  <body>
    <items>
      <item>
        <cntrctNo>R24TA0001</cntrctNo>
        <cntrctNm>전투복 제조 &amp; 납품</cntrctNm>
        <dminsttNm>국방부</dminsttNm>
        <thtmCntrctAmt>1500000</thtmCntrctAmt>
        <rmrk/>
      </item>
      <item>
        <cntrctNo>R24TA0002</cntrctNo>
        <cntrctNm><![CDATA[사무용품 <일괄>]]></cntrctNm>
        <dminsttNm>조달청</dminsttNm>
        <thtmCntrctAmt>320000</thtmCntrctAmt>
      </item>
    </items>
    <numOfRows>999</numOfRows>
    <totalCount>2</totalCount>
  </body>
</response>"#;

    #[test]
    fn parses_items_and_envelope() {
        let payload = parse_items(SAMPLE, "item").unwrap();
        payload.ensure_success().unwrap();
        assert_eq!(payload.result_msg.as_deref(), Some("NORMAL SERVICE."));
        assert_eq!(payload.items.len(), 2);

        let first = &payload.items[0];
        assert_eq!(first[0], ("cntrctNo".to_string(), "R24TA0001".to_string()));
        assert_eq!(first[1].1, "전투복 제조 & 납품");
        assert_eq!(first[4], ("rmrk".to_string(), String::new()));
        assert_eq!(payload.items[1][1].1, "사무용품 <일괄>");
    }

    #[test]
    fn nested_children_fold_into_parent_text() {
        let xml = "<items><item><a><b>x</b><c>y</c></a><d>z</d></item></items>";
        let payload = parse_items(xml, "item").unwrap();
        assert_eq!(
            payload.items[0],
            vec![
                ("a".to_string(), "xy".to_string()),
                ("d".to_string(), "z".to_string())
            ]
        );
    }

    #[test]
    fn item_text_keeps_quotes() {
        let xml = r#"<items><item><cntrctNm>"K9" 자주포 부품</cntrctNm><rmrk> "긴급" </rmrk></item></items>"#;
        let payload = parse_items(xml, "item").unwrap();
        assert_eq!(payload.items[0][0].1, "\"K9\" 자주포 부품");
        assert_eq!(payload.items[0][1].1, "\"긴급\"");
    }

    #[test]
    fn error_code_is_reported() {
        let xml = "<response><header><resultCode>30</resultCode>\
                   <resultMsg>SERVICE KEY IS NOT REGISTERED ERROR.</resultMsg></header></response>";
        let payload = parse_items(xml, "item").unwrap();
        assert!(payload.items.is_empty());
        let err = payload.ensure_success().unwrap_err().to_string();
        assert!(err.contains("30"), "{err}");
    }

    #[test]
    fn empty_body_has_no_items() {
        let xml = "<response><header><resultCode>00</resultCode></header><body><items/></body></response>";
        let payload = parse_items(xml, "item").unwrap();
        payload.ensure_success().unwrap();
        assert!(payload.items.is_empty());
    }
}
