//! Home Assistant MQTT discovery payloads
//!
//! Published (retained) once per broker connection so Home Assistant can
//! create the device's entities without manual configuration.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use serde::Serialize;

use crate::message::{to_json, MessageError};
use crate::topics::{self, Topics};

const MANUFACTURER: &str = "SCX.TW";
const MODEL: &str = "QBIT";

/// Device identity shared by every entity
#[derive(Debug, Clone, Serialize)]
struct DeviceBlock<'a> {
    ids: [String; 1],
    name: &'a str,
    mf: &'static str,
    mdl: &'static str,
    sw: &'a str,
}

/// One entity config, using Home Assistant's abbreviated keys
#[derive(Debug, Clone, Serialize)]
struct EntityConfig<'a> {
    name: &'static str,
    uniq_id: String,
    default_entity_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    stat_t: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cmd_t: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    val_tpl: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pl_on: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pl_off: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pl_prs: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dev_cla: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    json_attr_t: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    json_attr_tpl: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frc_upd: Option<bool>,
    icon: &'static str,
    dev: &'a DeviceBlock<'a>,
}

#[derive(Serialize)]
struct PressPayload<'a> {
    command: &'a str,
    sender: &'a str,
    text: &'a str,
}

/// A discovery message ready to publish (retained)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryMessage {
    pub topic: String,
    pub payload: String,
}

/// Build every discovery message for a device
///
/// # Arguments
/// * `topics` - the device's topic set (prefix and id)
/// * `device_id` - device identifier, lower-cased for entity ids
/// * `name` - human readable device name
/// * `version` - firmware version string
pub fn discovery_messages(
    topics: &Topics,
    device_id: &str,
    name: &str,
    version: &str,
) -> Result<Vec<DiscoveryMessage>, MessageError> {
    let id = device_id.to_lowercase();
    let dev = DeviceBlock {
        ids: [format!("qbit_{}", id)],
        name,
        mf: MANUFACTURER,
        mdl: MODEL,
        sw: version,
    };

    let entity = |component: &str, object: &str, name: &'static str, icon: &'static str| {
        let config = EntityConfig {
            name,
            uniq_id: format!("qbit_{}_{}", id, object),
            default_entity_id: format!("{}.qbit_{}_{}", component, id, object),
            stat_t: None,
            cmd_t: None,
            val_tpl: None,
            pl_on: None,
            pl_off: None,
            pl_prs: None,
            dev_cla: None,
            json_attr_t: None,
            json_attr_tpl: None,
            max: None,
            frc_upd: None,
            icon,
            dev: &dev,
        };
        let topic = format!("homeassistant/{}/qbit_{}/{}/config", component, id, object);
        (topic, config)
    };

    let press = to_json(&PressPayload {
        command: "poke",
        sender: "Home Assistant",
        text: "Poke!",
    })?;

    let mut configs = Vec::new();

    let (topic, mut c) = entity("binary_sensor", "status", "Status", "mdi:lan-connect");
    c.stat_t = Some(topics.topic(topics::STATUS));
    c.pl_on = Some(topics::ONLINE);
    c.pl_off = Some(topics::OFFLINE);
    c.dev_cla = Some("connectivity");
    configs.push((topic, c));

    let (topic, mut c) = entity("sensor", "ip", "IP Address", "mdi:ip-network");
    c.stat_t = Some(topics.topic(topics::INFO));
    c.val_tpl = Some("{{ value_json.ip }}");
    configs.push((topic, c));

    let (topic, mut c) = entity("button", "poke", "Poke", "mdi:hand-wave");
    c.cmd_t = Some(topics.topic(topics::COMMAND));
    c.pl_prs = Some(press);
    configs.push((topic, c));

    let (topic, mut c) = entity("text", "poke_message", "Poke message", "mdi:message-text-outline");
    c.cmd_t = Some(topics.topic(topics::POKE_TEXT_SET));
    c.max = Some(64);
    configs.push((topic, c));

    let (topic, mut c) = entity("sensor", "last_poke", "Last Poke", "mdi:message-text");
    c.stat_t = Some(topics.topic(topics::POKE));
    c.val_tpl = Some("{{ value_json.sender }}");
    c.json_attr_t = Some(topics.topic(topics::POKE));
    c.json_attr_tpl = Some(
        "{{ {'sender': value_json.sender, 'message': value_json.text, 'time': value_json.time} | tojson }}",
    );
    configs.push((topic, c));

    let (topic, mut c) = entity("switch", "mute", "Mute", "mdi:volume-off");
    c.stat_t = Some(topics.topic(topics::MUTE_STATE));
    c.cmd_t = Some(topics.topic(topics::MUTE_SET));
    configs.push((topic, c));

    let (topic, mut c) = entity("sensor", "touch", "Touch", "mdi:gesture-tap");
    c.stat_t = Some(topics.topic(topics::TOUCH));
    c.val_tpl = Some("{{ value_json.type }}");
    c.frc_upd = Some(true);
    configs.push((topic, c));

    let (topic, mut c) = entity("button", "next", "Next Animation", "mdi:skip-next");
    c.cmd_t = Some(topics.topic(topics::ANIMATION_NEXT));
    configs.push((topic, c));

    configs
        .into_iter()
        .map(|(topic, config)| {
            Ok(DiscoveryMessage {
                topic,
                payload: to_json(&config)?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discovery_topics() {
        let topics = Topics::new("qbit", "AB12");
        let msgs = discovery_messages(&topics, "AB12", "QBIT-AB12", "0.1.0").unwrap();
        assert_eq!(msgs.len(), 8);
        assert_eq!(msgs[0].topic, "homeassistant/binary_sensor/qbit_ab12/status/config");
        assert!(msgs
            .iter()
            .any(|m| m.topic == "homeassistant/switch/qbit_ab12/mute/config"));
    }

    #[test]
    fn test_discovery_payload_fields() {
        let topics = Topics::new("qbit", "AB12");
        let msgs = discovery_messages(&topics, "AB12", "QBIT-AB12", "0.1.0").unwrap();

        let status = &msgs[0].payload;
        assert!(status.contains(r#""stat_t":"qbit/AB12/status""#));
        assert!(status.contains(r#""pl_on":"online""#));
        assert!(status.contains(r#""ids":["qbit_ab12"]"#));
        assert!(!status.contains("cmd_t"));

        let poke = msgs
            .iter()
            .find(|m| m.topic.ends_with("/poke/config"))
            .unwrap();
        assert!(poke.payload.contains(r#""cmd_t":"qbit/AB12/command""#));
        assert!(poke.payload.contains(r#"\"sender\":\"Home Assistant\""#));

        let text = msgs
            .iter()
            .find(|m| m.topic.ends_with("/poke_message/config"))
            .unwrap();
        assert!(text.payload.contains(r#""cmd_t":"qbit/AB12/poke_text/set""#));
        assert!(text.payload.contains(r#""max":64"#));
    }
}
