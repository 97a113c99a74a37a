//! Web URLs for project URIs.
//!
//! The archive names a project `user_repo` when it is hosted on GitHub and
//! `platform_user_repo` otherwise, with `platform` taken from a fixed list.

/// Project URI prefix → host (and path prefix) of the forge.
pub const PLATFORMS: &[(&str, &str)] = &[
    ("android.googlesource.com", "android.googlesource.com"),
    ("bioconductor.org", "bioconductor.org"),
    ("bitbucket.org", "bitbucket.org"),
    ("drupal.com", "git.drupal.org"),
    ("git.eclipse.org", "git.eclipse.org"),
    ("git.kernel.org", "git.kernel.org"),
    ("git.postgresql.org", "git.postgresql.org"),
    ("git.savannah.gnu.org", "git.savannah.gnu.org"),
    ("git.zx2c4.com", "git.zx2c4.com"),
    ("gitlab.com", "gitlab.com"),
    ("gitlab.gnome.org", "gitlab.gnome.org"),
    ("kde.org", "anongit.kde.org"),
    ("repo.or.cz", "repo.or.cz"),
    ("salsa.debian.org", "salsa.debian.org"),
    ("sourceforge.net", "git.code.sf.net/p"),
    // Abbreviations used by older archive versions.
    ("bb", "bitbucket.org"),
    ("gl", "gitlab.com"),
    ("github.com", "github.com"),
];

const DEFAULT_PLATFORM: &str = "github.com";

/// Host for a URI prefix, if it names a known forge.
pub fn platform(prefix: &str) -> Option<&'static str> {
    PLATFORMS
        .iter()
        .find(|(known, _)| *known == prefix)
        .map(|(_, host)| *host)
}

/// Web URL of the project named `uri`.
pub fn project_url(uri: &str) -> String {
    let parts: Vec<&str> = uri.split('_').collect();
    match (parts.as_slice(), platform(parts[0])) {
        ([_, name], Some(host)) => format!("https://{host}/{name}"),
        ([_, user, rest @ ..], Some(host)) => {
            format!("https://{host}/{user}/{}", rest.join("_"))
        }
        ([user, rest @ ..], _) if !rest.is_empty() => {
            format!("https://{DEFAULT_PLATFORM}/{user}/{}", rest.join("_"))
        }
        _ => format!("https://{DEFAULT_PLATFORM}/{uri}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn github_is_the_default() {
        assert_eq!(project_url("CS340-19_lectures"), "https://github.com/CS340-19/lectures");
        assert_eq!(project_url("user2589_my_repo"), "https://github.com/user2589/my_repo");
        assert_eq!(project_url("loner"), "https://github.com/loner");
    }

    #[test]
    fn known_platforms() {
        assert_eq!(
            project_url("gitlab.com_inkscape_inkscape"),
            "https://gitlab.com/inkscape/inkscape"
        );
        assert_eq!(
            project_url("sourceforge.net_tcl"),
            "https://git.code.sf.net/p/tcl"
        );
        assert_eq!(project_url("kde.org_kate"), "https://anongit.kde.org/kate");
        assert_eq!(
            project_url("bb_fenics-project_dolfin_x"),
            "https://bitbucket.org/fenics-project/dolfin_x"
        );
        assert_eq!(platform("example.com"), None);
    }
}
