//! Room template management, restricted to template administrators.
//!
//! Request resolves the session, Authorize loads the caller's account, and
//! Execute runs only for administrators; everyone else gets Forbidden.

use concord_core::{Invocation, Pattern, SyncRule, Var};

use super::helpers::{
    authenticate, is_template_admin, request_to, respond_error, respond_failure,
    respond_refused, session_required, TemplateAdmins,
};

const ADD: &str = "/RoomTemplate/addTemplate";
const UPDATE: &str = "/RoomTemplate/updateTemplate";
const DELETE: &str = "/RoomTemplate/deleteTemplate";

const FORBIDDEN: &str = "Administrator access required";

fn authorize(name: &str, path: &'static str) -> SyncRule {
    SyncRule::declare(|v| {
        let [request, user_id, user] = v.vars(["request", "userID", "user"]);
        SyncRule::new(name)
            .when(request_to(path, request))
            .when(Pattern::new("Session", "getSessionUser").output_var(user_id))
            .then(
                Invocation::new("UserAccount", "getUser")
                    .arg_var(user_id)
                    .bind_var(user),
            )
    })
}

fn forbidden(name: &str, path: &'static str, admins: &TemplateAdmins) -> SyncRule {
    let admins = admins.clone();
    SyncRule::declare(|v| {
        let [request, user, error] = v.vars(["request", "user", "error"]);
        SyncRule::new(name)
            .when(request_to(path, request))
            .when(Pattern::new("UserAccount", "getUser").output_var(user))
            .filter_map([error], move |f| {
                let admin = f.get(user).is_some_and(|u| is_template_admin(u, &admins));
                (!admin).then(|| f.with(error, FORBIDDEN))
            })
            .then(respond_error(request, error))
    })
}

/// Keep frames whose `user` is a template administrator.
fn admins_only(rule: SyncRule, user: Var, admins: &TemplateAdmins) -> SyncRule {
    let admins = admins.clone();
    rule.filter(move |f| f.get(user).is_some_and(|u| is_template_admin(u, &admins)))
}

// ---------------------------------------------------------------------------
// addTemplate
// ---------------------------------------------------------------------------

fn add_template_execute(admins: &TemplateAdmins) -> SyncRule {
    SyncRule::declare(|v| {
        let [request, user, dorm_name, room_type, template_id, template] = v.vars([
            "request",
            "user",
            "dormName",
            "roomType",
            "templateID",
            "template",
        ]);
        let rule = SyncRule::new("AddTemplateExecute")
            .when(
                request_to(ADD, request)
                    .input_var(dorm_name)
                    .input_var(room_type),
            )
            .when(Pattern::new("UserAccount", "getUser").output_var(user));
        admins_only(rule, user, admins)
            .then(
                Invocation::new("RoomTemplate", "addTemplate")
                    .arg_var(dorm_name)
                    .arg_var(room_type)
                    .bind_var(template_id),
            )
            .then(
                Invocation::new("RoomTemplate", "getTemplate")
                    .arg_var(template_id)
                    .bind_var(template),
            )
    })
}

fn add_template_respond() -> SyncRule {
    SyncRule::declare(|v| {
        let [request, template_id, template] = v.vars(["request", "templateID", "template"]);
        SyncRule::new("AddTemplateRespond")
            .when(request_to(ADD, request))
            .when(Pattern::new("RoomTemplate", "addTemplate").output_var(template_id))
            .when(
                Pattern::new("RoomTemplate", "getTemplate")
                    .input_var(template_id)
                    .output_var(template),
            )
            .then(
                Invocation::new("Requesting", "respond")
                    .arg_var(request)
                    .arg("success", true)
                    .arg_var(template_id)
                    .arg_var(template),
            )
    })
}

// ---------------------------------------------------------------------------
// updateTemplate
// ---------------------------------------------------------------------------

fn update_template_execute(admins: &TemplateAdmins) -> SyncRule {
    SyncRule::declare(|v| {
        let [request, user, template_id, dorm_name, room_type, updated, template] = v.vars([
            "request",
            "user",
            "templateID",
            "dormName",
            "roomType",
            "updated",
            "template",
        ]);
        let rule = SyncRule::new("UpdateTemplateExecute")
            .when(
                request_to(UPDATE, request)
                    .input_var(template_id)
                    .input_var(dorm_name)
                    .input_var(room_type),
            )
            .when(Pattern::new("UserAccount", "getUser").output_var(user));
        admins_only(rule, user, admins)
            .then(
                Invocation::new("RoomTemplate", "updateTemplate")
                    .arg_var(template_id)
                    .arg_var(dorm_name)
                    .arg_var(room_type)
                    .bind_var(updated),
            )
            .then(
                Invocation::new("RoomTemplate", "getTemplate")
                    .arg_var(template_id)
                    .bind_var(template),
            )
    })
}

fn update_template_respond() -> SyncRule {
    SyncRule::declare(|v| {
        let [request, template_id, template] = v.vars(["request", "templateID", "template"]);
        SyncRule::new("UpdateTemplateRespond")
            .when(request_to(UPDATE, request))
            .when(
                Pattern::new("RoomTemplate", "updateTemplate")
                    .input_var(template_id)
                    .output("updated", true),
            )
            .when(
                Pattern::new("RoomTemplate", "getTemplate")
                    .input_var(template_id)
                    .output_var(template),
            )
            .then(
                Invocation::new("Requesting", "respond")
                    .arg_var(request)
                    .arg("success", true)
                    .arg_var(template),
            )
    })
}

// ---------------------------------------------------------------------------
// deleteTemplate
// ---------------------------------------------------------------------------

fn delete_template_execute(admins: &TemplateAdmins) -> SyncRule {
    SyncRule::declare(|v| {
        let [request, user, template_id, success] =
            v.vars(["request", "user", "templateID", "success"]);
        let rule = SyncRule::new("DeleteTemplateExecute")
            .when(request_to(DELETE, request).input_var(template_id))
            .when(Pattern::new("UserAccount", "getUser").output_var(user));
        admins_only(rule, user, admins).then(
            Invocation::new("RoomTemplate", "deleteTemplate")
                .arg_var(template_id)
                .bind_var(success),
        )
    })
}

fn delete_template_respond() -> SyncRule {
    SyncRule::declare(|v| {
        let request = v.var("request");
        SyncRule::new("DeleteTemplateRespond")
            .when(request_to(DELETE, request))
            .when(Pattern::new("RoomTemplate", "deleteTemplate").output("success", true))
            .then(
                Invocation::new("Requesting", "respond")
                    .arg_var(request)
                    .arg("success", true),
            )
    })
}

pub fn rules(admins: &TemplateAdmins) -> Vec<SyncRule> {
    vec![
        authenticate("AddTemplateRequest", ADD),
        authorize("AddTemplateAuthorize", ADD),
        add_template_execute(admins),
        add_template_respond(),
        respond_failure("AddTemplateFailure", ADD, "RoomTemplate", "addTemplate"),
        forbidden("AddTemplateForbidden", ADD, admins),
        session_required("AddTemplateUnauthorized", ADD),
        respond_failure("AddTemplateUnknownUser", ADD, "UserAccount", "getUser"),
        authenticate("UpdateTemplateRequest", UPDATE),
        authorize("UpdateTemplateAuthorize", UPDATE),
        update_template_execute(admins),
        update_template_respond(),
        respond_refused(
            "UpdateTemplateFailure",
            UPDATE,
            "RoomTemplate",
            "updateTemplate",
            "updated",
            "Template update failed",
        ),
        respond_failure("UpdateTemplateInvalid", UPDATE, "RoomTemplate", "updateTemplate"),
        forbidden("UpdateTemplateForbidden", UPDATE, admins),
        session_required("UpdateTemplateUnauthorized", UPDATE),
        respond_failure("UpdateTemplateUnknownUser", UPDATE, "UserAccount", "getUser"),
        authenticate("DeleteTemplateRequest", DELETE),
        authorize("DeleteTemplateAuthorize", DELETE),
        delete_template_execute(admins),
        delete_template_respond(),
        respond_refused(
            "DeleteTemplateFailure",
            DELETE,
            "RoomTemplate",
            "deleteTemplate",
            "success",
            "Template deletion failed",
        ),
        respond_failure("DeleteTemplateInvalid", DELETE, "RoomTemplate", "deleteTemplate"),
        forbidden("DeleteTemplateForbidden", DELETE, admins),
        session_required("DeleteTemplateUnauthorized", DELETE),
        respond_failure("DeleteTemplateUnknownUser", DELETE, "UserAccount", "getUser"),
    ]
}
