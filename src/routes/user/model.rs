use serde::Deserialize;

use crate::database::UserPatch;

/// 资料更新请求；phone / avatar_url 传空字符串表示清空
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    pub nickname: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
}

fn clearable(value: Option<String>) -> Option<Option<String>> {
    value.map(|v| {
        let v = v.trim();
        if v.is_empty() { None } else { Some(v.to_string()) }
    })
}

impl From<UpdateProfileRequest> for UserPatch {
    fn from(req: UpdateProfileRequest) -> Self {
        UserPatch {
            nickname: req.nickname.map(|n| n.trim().to_string()),
            email: req.email.map(|e| e.trim().to_string()),
            phone: clearable(req.phone),
            avatar_url: clearable(req.avatar_url),
        }
    }
}
