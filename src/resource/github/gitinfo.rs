//! Git history summary written next to documents.

use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use super::api::{Account, CommitAuthor, RepositoryCommit};

/// Summary of a document's history, serialized as pretty JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GitInfo {
    #[serde(rename = "lastmod", skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    #[serde(rename = "publishdate", skip_serializing_if = "Option::is_none")]
    pub publish_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<Contributor>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub contributors: Vec<Contributor>,
    #[serde(rename = "weburl", skip_serializing_if = "Option::is_none")]
    pub web_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
    #[serde(rename = "shaalias", skip_serializing_if = "Option::is_none")]
    pub sha_alias: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Contributor {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub login: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub email: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub html_url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub avatar_url: String,
    #[serde(rename = "type", skip_serializing_if = "String::is_empty")]
    pub kind: String,
}

fn parse_date(date: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(date, &Rfc3339).ok()
}

fn format_date(date: &str) -> String {
    let format = time::macros::format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    parse_date(date)
        .and_then(|d| d.format(&format).ok())
        .unwrap_or_else(|| date.to_string())
}

fn committer_date(commit: &RepositoryCommit) -> Option<OffsetDateTime> {
    commit.commit.committer.as_ref().and_then(|c| parse_date(&c.date))
}

fn is_internal(commit: &RepositoryCommit) -> bool {
    let message = &commit.commit.message;
    let email = commit
        .commit
        .committer
        .as_ref()
        .map_or("", |c| c.email.as_str());
    message.starts_with("[int]")
        || message.contains("[skip ci]")
        || email.starts_with("gardener.ci")
        || email.starts_with("gardener.opensource")
}

fn merge(account: Option<&Account>, author: &CommitAuthor) -> Contributor {
    let account = account.cloned().unwrap_or_default();
    Contributor {
        login: account.login,
        name: author.name.clone(),
        email: author.email.clone(),
        html_url: account.html_url,
        avatar_url: account.avatar_url,
        kind: account.kind,
    }
}

/// Author of `commit`: the linked account merged with the git author,
/// falling back to the git committer.
fn commit_author(commit: &RepositoryCommit) -> Option<Contributor> {
    if let Some(author) = &commit.commit.author {
        return Some(merge(commit.author.as_ref(), author));
    }
    if let Some(committer) = &commit.commit.committer {
        return Some(merge(None, committer));
    }
    commit.author.as_ref().map(|a| Contributor {
        login: a.login.clone(),
        html_url: a.html_url.clone(),
        avatar_url: a.avatar_url.clone(),
        kind: a.kind.clone(),
        ..Default::default()
    })
}

/// Summarize `commits`, skipping internal ones. `None` when nothing is left.
pub fn transform(commits: &[RepositoryCommit]) -> Option<GitInfo> {
    let mut commits: Vec<&RepositoryCommit> = commits.iter().filter(|c| !is_internal(c)).collect();
    if commits.is_empty() {
        return None;
    }
    commits.sort_by(|a, b| committer_date(b).cmp(&committer_date(a)));

    let newest = commits[0];
    let oldest = commits[commits.len() - 1];
    let date_of = |c: &RepositoryCommit| {
        c.commit
            .committer
            .as_ref()
            .map(|committer| format_date(&committer.date))
    };

    let author = commit_author(oldest);
    if author.is_none() {
        crate::log!("warning"; "cannot get commit author of {}", oldest.html_url);
    }
    let author_email = author.as_ref().map(|a| a.email.clone()).unwrap_or_default();

    let mut contributors: Vec<Contributor> = Vec::new();
    if commits.len() > 1 {
        for commit in &commits {
            let Some(contributor) = commit_author(commit) else {
                continue;
            };
            if contributor.kind == "User"
                && contributor.email != author_email
                && !contributors.iter().any(|c| c.email == contributor.email)
            {
                contributors.push(contributor);
            }
        }
    }

    Some(GitInfo {
        last_modified: date_of(newest),
        publish_date: date_of(oldest),
        author,
        contributors,
        web_url: newest
            .html_url
            .split("/commit/")
            .next()
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        ..Default::default()
    })
}
