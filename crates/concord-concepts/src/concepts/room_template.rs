//! `RoomTemplate`: the catalog of dorm rooms posts are designed for.

use concord_core::{Concept, ConceptError, Operation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    #[serde(rename = "templateID")]
    pub template_id: String,
    pub dorm_name: String,
    pub room_type: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddTemplate {
    pub dorm_name: String,
    pub room_type: String,
}

#[derive(Debug, Deserialize)]
pub struct TemplateRef {
    #[serde(rename = "templateID")]
    pub template_id: String,
}

/// Empty or absent filters match everything.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindTemplates {
    #[serde(default)]
    pub dorm_name: Option<String>,
    #[serde(default)]
    pub room_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTemplate {
    #[serde(rename = "templateID")]
    pub template_id: String,
    #[serde(default)]
    pub dorm_name: Option<String>,
    #[serde(default)]
    pub room_type: Option<String>,
}

#[derive(Default)]
pub struct RoomTemplate {
    templates: RwLock<Vec<Template>>,
}

impl RoomTemplate {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_template(&self, args: AddTemplate) -> Result<String, ConceptError> {
        if args.dorm_name.trim().is_empty() || args.room_type.trim().is_empty() {
            return Err(ConceptError::InvalidArguments(
                "dormName and roomType are required".into(),
            ));
        }
        let template = Template {
            template_id: Uuid::new_v4().to_string(),
            dorm_name: args.dorm_name,
            room_type: args.room_type,
        };
        let id = template.template_id.clone();
        self.templates.write().await.push(template);
        Ok(id)
    }

    pub async fn get_template(&self, args: TemplateRef) -> Result<Template, ConceptError> {
        self.templates
            .read()
            .await
            .iter()
            .find(|t| t.template_id == args.template_id)
            .cloned()
            .ok_or_else(|| ConceptError::NotFound("Template not found".into()))
    }

    pub async fn find_templates(&self, args: FindTemplates) -> Vec<Template> {
        let wanted = |filter: &Option<String>, value: &str| {
            filter.as_deref().map_or(true, |f| f.is_empty() || f == value)
        };
        self.templates
            .read()
            .await
            .iter()
            .filter(|t| wanted(&args.dorm_name, &t.dorm_name) && wanted(&args.room_type, &t.room_type))
            .cloned()
            .collect()
    }

    /// `false` if the template does not exist.
    pub async fn update_template(&self, args: UpdateTemplate) -> bool {
        let mut templates = self.templates.write().await;
        let Some(t) = templates.iter_mut().find(|t| t.template_id == args.template_id) else {
            return false;
        };
        if let Some(dorm) = args.dorm_name.filter(|d| !d.trim().is_empty()) {
            t.dorm_name = dorm;
        }
        if let Some(room) = args.room_type.filter(|r| !r.trim().is_empty()) {
            t.room_type = room;
        }
        true
    }

    pub async fn delete_template(&self, args: TemplateRef) -> bool {
        let mut templates = self.templates.write().await;
        let before = templates.len();
        templates.retain(|t| t.template_id != args.template_id);
        templates.len() < before
    }
}

impl Concept for RoomTemplate {
    fn name(&self) -> &'static str {
        "RoomTemplate"
    }

    fn operations(self: Arc<Self>) -> Vec<Operation> {
        vec![
            Operation::bound("addTemplate", &self, |c, a: AddTemplate| async move {
                c.add_template(a).await.map(|id| json!({ "templateID": id }))
            })
            .accepts(["dormName", "roomType"])
            .returns(["templateID"]),
            Operation::bound("getTemplate", &self, |c, a: TemplateRef| async move {
                c.get_template(a).await.map(|t| json!({ "template": t }))
            })
            .accepts(["templateID"])
            .returns(["template"]),
            Operation::bound("findTemplates", &self, |c, a: FindTemplates| async move {
                let templates = c.find_templates(a).await;
                Ok::<_, ConceptError>(json!({ "templates": templates }))
            })
            .accepts(["dormName", "roomType"])
            .returns(["templates"]),
            Operation::bound("updateTemplate", &self, |c, a: UpdateTemplate| async move {
                let updated = c.update_template(a).await;
                Ok::<_, ConceptError>(json!({ "updated": updated }))
            })
            .accepts(["templateID", "dormName", "roomType"])
            .returns(["updated"]),
            Operation::bound("deleteTemplate", &self, |c, a: TemplateRef| async move {
                let success = c.delete_template(a).await;
                Ok::<_, ConceptError>(json!({ "success": success }))
            })
            .accepts(["templateID"])
            .returns(["success"]),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn catalog() -> (RoomTemplate, String) {
        let rooms = RoomTemplate::new();
        let id = rooms
            .add_template(AddTemplate {
                dorm_name: "Baker".into(),
                room_type: "Single".into(),
            })
            .await
            .unwrap();
        rooms
            .add_template(AddTemplate {
                dorm_name: "Baker".into(),
                room_type: "Double".into(),
            })
            .await
            .unwrap();
        rooms
            .add_template(AddTemplate {
                dorm_name: "Simmons".into(),
                room_type: "Single".into(),
            })
            .await
            .unwrap();
        (rooms, id)
    }

    #[tokio::test]
    async fn find_templates_filters_optionally() {
        let (rooms, _) = catalog().await;
        assert_eq!(rooms.find_templates(FindTemplates::default()).await.len(), 3);
        let baker = rooms
            .find_templates(FindTemplates {
                dorm_name: Some("Baker".into()),
                room_type: None,
            })
            .await;
        assert_eq!(baker.len(), 2);
        let singles_in_baker = rooms
            .find_templates(FindTemplates {
                dorm_name: Some("Baker".into()),
                room_type: Some("Single".into()),
            })
            .await;
        assert_eq!(singles_in_baker.len(), 1);
        let blank = rooms
            .find_templates(FindTemplates {
                dorm_name: Some(String::new()),
                room_type: Some("Single".into()),
            })
            .await;
        assert_eq!(blank.len(), 2);
    }

    #[tokio::test]
    async fn update_and_delete() {
        let (rooms, id) = catalog().await;
        assert!(
            rooms
                .update_template(UpdateTemplate {
                    template_id: id.clone(),
                    dorm_name: None,
                    room_type: Some("Triple".into()),
                })
                .await
        );
        let t = rooms
            .get_template(TemplateRef {
                template_id: id.clone(),
            })
            .await
            .unwrap();
        assert_eq!((t.dorm_name.as_str(), t.room_type.as_str()), ("Baker", "Triple"));

        assert!(rooms.delete_template(TemplateRef { template_id: id.clone() }).await);
        assert!(!rooms.delete_template(TemplateRef { template_id: id }).await);
    }

    #[tokio::test]
    async fn add_requires_both_fields() {
        let rooms = RoomTemplate::new();
        let err = rooms
            .add_template(AddTemplate {
                dorm_name: "".into(),
                room_type: "Single".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ConceptError::InvalidArguments(_)));
    }
}
