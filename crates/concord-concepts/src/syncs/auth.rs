//! Registration, login and logout.
//!
//! These routes have no concept of their own: `Requesting` carries the
//! request, `Authentication` checks or creates the account, and `Session`
//! issues or revokes the token.

use concord_core::{Invocation, Pattern, SyncRule, Vars};

use super::helpers::{
    authenticate, request_to, reshape, respond_failure, sanitize_user, session_required,
};

pub const REGISTER: &str = "/Auth/register";
pub const LOGIN: &str = "/Auth/login";
pub const LOGOUT: &str = "/Auth/logout";

// ---------------------------------------------------------------------------
// register
// ---------------------------------------------------------------------------

fn register_execute(v: &mut Vars) -> SyncRule {
    let [request, username, mit_kerberos, password, bio, user_id, token] = v.vars([
        "request",
        "username",
        "mitKerberos",
        "password",
        "bio",
        "userID",
        "token",
    ]);
    SyncRule::new("RegisterExecute")
        .when(
            request_to(REGISTER, request)
                .input_var(username)
                .input_var(mit_kerberos)
                .input_var(password)
                .input_var(bio),
        )
        .then(
            Invocation::new("Authentication", "registerAndCreateAccount")
                .arg_var(username)
                .arg_var(mit_kerberos)
                .arg_var(bio)
                .arg("credential_data", password)
                .bind_var(user_id),
        )
        .then(
            Invocation::new("Session", "createSession")
                .arg_var(user_id)
                .bind_var(token),
        )
}

fn register_respond(v: &mut Vars) -> SyncRule {
    let [request, username, user_id, token] = v.vars(["request", "username", "userID", "token"]);
    SyncRule::new("RegisterRespond")
        .when(request_to(REGISTER, request))
        .when(
            Pattern::new("Authentication", "registerAndCreateAccount")
                .input_var(username)
                .output_var(user_id),
        )
        .when(
            Pattern::new("Session", "createSession")
                .input_var(user_id)
                .output_var(token),
        )
        .then(
            Invocation::new("Requesting", "respond")
                .arg_var(request)
                .arg("success", true)
                .arg_var(user_id)
                .arg_var(username)
                .arg_var(token),
        )
}

// ---------------------------------------------------------------------------
// login
// ---------------------------------------------------------------------------

fn login_execute(v: &mut Vars) -> SyncRule {
    let [request, mit_kerberos, password, user_id, token, user] = v.vars([
        "request",
        "mitKerberos",
        "password",
        "userID",
        "token",
        "user",
    ]);
    SyncRule::new("LoginExecute")
        .when(
            request_to(LOGIN, request)
                .input_var(mit_kerberos)
                .input_var(password),
        )
        .then(
            Invocation::new("Authentication", "verifyCredentials")
                .arg_var(mit_kerberos)
                .arg("credential_data", password)
                .bind_var(user_id),
        )
        .then(
            Invocation::new("Session", "createSession")
                .arg_var(user_id)
                .bind_var(token),
        )
        .then(
            Invocation::new("UserAccount", "getUser")
                .arg_var(user_id)
                .bind_var(user),
        )
}

fn login_respond(v: &mut Vars) -> SyncRule {
    let [request, user_id, token, user] = v.vars(["request", "userID", "token", "user"]);
    SyncRule::new("LoginRespond")
        .when(request_to(LOGIN, request))
        .when(Pattern::new("Authentication", "verifyCredentials").output_var(user_id))
        .when(
            Pattern::new("Session", "createSession")
                .input_var(user_id)
                .output_var(token),
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
                .arg_var(user_id)
                .arg_var(token)
                .arg_var(user),
        )
}

// ---------------------------------------------------------------------------
// logout
// ---------------------------------------------------------------------------

fn logout_execute(v: &mut Vars) -> SyncRule {
    let [request, session, user_id, success] =
        v.vars(["request", "session", "userID", "success"]);
    SyncRule::new("LogoutExecute")
        .when(request_to(LOGOUT, request).input_var(session))
        .when(Pattern::new("Session", "getSessionUser").output_var(user_id))
        .then(
            Invocation::new("Session", "endSession")
                .arg("token", session)
                .bind_var(success),
        )
}

fn logout_respond(v: &mut Vars) -> SyncRule {
    let [request, success] = v.vars(["request", "success"]);
    SyncRule::new("LogoutRespond")
        .when(request_to(LOGOUT, request))
        .when(Pattern::new("Session", "endSession").output_var(success))
        .then(
            Invocation::new("Requesting", "respond")
                .arg_var(request)
                .arg_var(success),
        )
}

pub fn rules() -> Vec<SyncRule> {
    vec![
        SyncRule::declare(register_execute),
        SyncRule::declare(register_respond),
        respond_failure(
            "RegisterFailure",
            REGISTER,
            "Authentication",
            "registerAndCreateAccount",
        ),
        SyncRule::declare(login_execute),
        SyncRule::declare(login_respond),
        respond_failure("LoginFailure", LOGIN, "Authentication", "verifyCredentials"),
        authenticate("LogoutRequest", LOGOUT),
        SyncRule::declare(logout_execute),
        SyncRule::declare(logout_respond),
        session_required("LogoutUnauthorized", LOGOUT),
    ]
}
