//! Profile updates for the signed-in user.

use concord_core::{Invocation, Pattern, SyncRule, Vars};

use super::helpers::{
    authenticate, request_to, reshape, respond_failure, respond_refused, sanitize_user,
    session_required,
};

const UPDATE_PROFILE: &str = "/UserAccount/updateUserProfile";

fn update_profile_authorize(v: &mut Vars) -> SyncRule {
    let [request, user_id, bio, success, user] =
        v.vars(["request", "userID", "bio", "success", "user"]);
    SyncRule::new("UpdateProfileAuthorize")
        .when(request_to(UPDATE_PROFILE, request).input_var(bio))
        .when(Pattern::new("Session", "getSessionUser").output_var(user_id))
        .then(
            Invocation::new("UserAccount", "updateUserProfile")
                .arg_var(user_id)
                .arg_var(bio)
                .bind_var(success),
        )
        .then(
            Invocation::new("UserAccount", "getUser")
                .arg_var(user_id)
                .bind_var(user),
        )
}

fn update_profile_respond(v: &mut Vars) -> SyncRule {
    let [request, user_id, user] = v.vars(["request", "userID", "user"]);
    SyncRule::new("UpdateProfileRespond")
        .when(request_to(UPDATE_PROFILE, request))
        .when(
            Pattern::new("UserAccount", "updateUserProfile")
                .input_var(user_id)
                .output("success", true),
        )
        .when(
            Pattern::new("UserAccount", "getUser")
                .input_var(user_id)
                .output_var(user),
        )
        .filter_map([], move |f| reshape(f, user, sanitize_user))
        .then(
            Invocation::new("Requesting", "respond")
                .arg_var(request)
                .arg("success", true)
                .arg_var(user),
        )
}

pub fn rules() -> Vec<SyncRule> {
    vec![
        authenticate("UpdateProfileRequest", UPDATE_PROFILE),
        SyncRule::declare(update_profile_authorize),
        SyncRule::declare(update_profile_respond),
        respond_refused(
            "UpdateProfileFailure",
            UPDATE_PROFILE,
            "UserAccount",
            "updateUserProfile",
            "success",
            "Failed to update profile",
        ),
        respond_failure(
            "UpdateProfileInvalid",
            UPDATE_PROFILE,
            "UserAccount",
            "updateUserProfile",
        ),
        session_required("UpdateProfileUnauthorized", UPDATE_PROFILE),
    ]
}
