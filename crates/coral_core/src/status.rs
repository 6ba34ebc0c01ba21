//! Debug snapshot of the object graph

use serde::Serialize;

use crate::lifecycle::Lifecycle;
use crate::object::ObjectId;
use crate::runtime::Runtime;

/// State of one object
#[derive(Clone, Debug, Serialize)]
pub struct ObjectStatus {
    pub id: ObjectId,
    pub type_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub location: String,
    pub lifecycle: Lifecycle,
    pub parent: Option<ObjectId>,
    pub children: Vec<ObjectId>,
    /// Total references held on this object
    pub references: usize,
    pub holders: Vec<ObjectId>,
    /// Objects this one references
    pub holding: Vec<ObjectId>,
    pub connections: usize,
    pub properties: Vec<String>,
}

/// Snapshot of the whole runtime
#[derive(Clone, Debug, Serialize)]
pub struct StatusReport {
    pub object_count: usize,
    pub deferred: usize,
    pub timers: usize,
    pub objects: Vec<ObjectStatus>,
}

impl StatusReport {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn find(&self, id: ObjectId) -> Option<&ObjectStatus> {
        self.objects.iter().find(|o| o.id == id)
    }
}

impl Runtime {
    /// Collect a [`StatusReport`]
    pub fn status(&self) -> StatusReport {
        let objects = self
            .objects
            .iter()
            .map(|(id, record)| ObjectStatus {
                id,
                type_name: record.type_name.clone(),
                location: record.location.clone(),
                lifecycle: record.lifecycle.current(),
                parent: record.parent,
                children: record.children.to_vec(),
                references: record.holders.iter().map(|(_, n)| n).sum(),
                holders: record.holders.iter().map(|(h, _)| *h).collect(),
                holding: record.holding.iter().map(|(t, _)| *t).collect(),
                connections: record.events.connection_count(),
                properties: record.properties.names().to_vec(),
            })
            .collect();
        StatusReport {
            object_count: self.objects.len(),
            deferred: self.deferred_len(),
            timers: self.pending_timers(),
            objects,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::Property;

    #[test]
    fn test_status_reflects_graph() {
        let mut rt = Runtime::new();
        let root = rt.create("Root");
        let child = rt.create("Child");
        let model = rt.create("Model");
        rt.add(root, child).unwrap();
        rt.declare_property(child, "model", Property::stored(model)).unwrap();
        rt.init(root).unwrap();

        let report = rt.status();
        assert_eq!(report.object_count, 3);
        let root_status = report.find(root).unwrap();
        assert_eq!(root_status.children, vec![child]);
        assert_eq!(root_status.lifecycle, Lifecycle::Running);
        let model_status = report.find(model).unwrap();
        assert_eq!(model_status.references, 1);
        assert_eq!(model_status.holders, vec![child]);
        assert_eq!(report.find(child).unwrap().holding, vec![model]);
    }

    #[test]
    fn test_status_json() {
        let mut rt = Runtime::new();
        let id = rt.create("Thing");
        rt.set_location(id, "app.shui:1");
        let json = rt.status().to_json().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["object_count"], 1);
        assert_eq!(parsed["objects"][0]["type_name"], "Thing");
        assert_eq!(parsed["objects"][0]["lifecycle"], "Created");
    }
}
